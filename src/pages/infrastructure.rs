//! Worker, queue and grid capacity overview.

struct InfraCard {
    title: &'static str,
    stats: &'static [(&'static str, u32)],
}

// Live counters are not exposed by the control plane yet.
const CARDS: &[InfraCard] = &[
    InfraCard {
        title: "Workers",
        stats: &[("Ready", 0), ("Busy", 0)],
    },
    InfraCard {
        title: "Queue",
        stats: &[("Pending", 0)],
    },
    InfraCard {
        title: "Selenium Grid",
        stats: &[("Nodes", 0), ("Sessions", 0)],
    },
];

pub fn view() -> String {
    let mut output = String::from("Infrastructure\n");
    for card in CARDS {
        output.push('\n');
        output.push_str(card.title);
        output.push('\n');
        for (label, value) in card.stats {
            output.push_str(&format!("  {:>3}  {}\n", value, label));
        }
    }
    output
}
