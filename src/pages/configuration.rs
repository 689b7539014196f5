const SECTIONS: &[(&str, &str)] = &[
    (
        "Project Settings",
        "Configure project settings, suites, and environments.",
    ),
    (
        "Integrations",
        "Configure webhooks, Slack, Teams, and other integrations.",
    ),
    ("Coverage Thresholds", "Set coverage thresholds per layer."),
];

pub fn view() -> String {
    let mut output = String::from("Configuration\n");
    for (title, text) in SECTIONS {
        output.push_str(&format!("\n{}\n  {}\n", title, text));
    }
    output
}
