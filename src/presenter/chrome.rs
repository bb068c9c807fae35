//! Static header and footer printed around the status region in text mode.

const BRAND: &str = "FitForm";
const NAV_LINKS: [&str; 4] = ["Home", "How It Works", "Exercises", "Pricing"];
const FOOTER_SECTIONS: [(&str, [&str; 3]); 3] = [
    ("Product", ["Features", "Pricing", "API"]),
    ("Company", ["About", "Careers", "Contact"]),
    ("Resources", ["Blog", "Guides", "Help Center"]),
];

pub fn navbar() -> String {
    let title = format!("{BRAND} · squat coach v{}", env!("CARGO_PKG_VERSION"));
    let rule = "─".repeat(title.chars().count().max(40));
    format!("{title}\n{}\n{rule}", NAV_LINKS.join("  |  "))
}

pub fn footer() -> String {
    let mut lines = vec!["─".repeat(40)];
    for (section, links) in FOOTER_SECTIONS {
        lines.push(format!("{section}: {}", links.join(", ")));
    }
    lines.push(format!("© {BRAND} Analyzer. All rights reserved."));
    lines.join("\n")
}
