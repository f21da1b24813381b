//! Preset listing.

use console::style;

use crate::presets::{all, ConcurrencyRule, PresetId};

fn describe_rule(rule: ConcurrencyRule) -> String {
    match rule {
        ConcurrencyRule::Single => "1".to_string(),
        ConcurrencyRule::UpTo(max) => format!("up to {}", max),
        ConcurrencyRule::SpareOneCore(max) => format!("cores-1, up to {}", max),
    }
}

pub fn cmd_presets() -> anyhow::Result<()> {
    println!("\n{}", style("Presets").bold());
    println!("{}", "-".repeat(50));

    for preset in all().iter().filter(|p| p.id != PresetId::Custom) {
        let marker = if preset.id == PresetId::default() {
            style("*").green().to_string()
        } else {
            " ".to_string()
        };
        println!(
            "{} {} {}",
            marker,
            style(format!("{:<12}", preset.id.as_str())).cyan(),
            preset.description
        );
        let ladder: Vec<&str> = preset
            .attempts(false, preset.defaults.segmentation)
            .iter()
            .map(|a| a.label)
            .collect();
        println!(
            "  {:<12} psm {}, scale {:.1}, contrast {:.2}, sharpen {:.2}, {}{}",
            "",
            preset.defaults.segmentation,
            preset.defaults.scale,
            preset.defaults.contrast,
            preset.defaults.sharpen,
            if preset.defaults.grayscale { "gray" } else { "color" },
            if preset.defaults.binarize { ", binarized" } else { "" }
        );
        println!(
            "  {:<12} {}",
            "",
            style(format!(
                "budget {}s, timeout {}s, ocr {}, render {}, ladder {}",
                preset.page_budget.as_secs(),
                preset.timeout.as_secs(),
                describe_rule(preset.ocr_concurrency),
                describe_rule(preset.render_concurrency),
                ladder.join(" > ")
            ))
            .dim()
        );
    }

    println!();
    println!(
        "{} Overriding any single setting switches to {}",
        style("→").cyan(),
        style(PresetId::Custom).bold()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_describe_rule() {
        assert_eq!(describe_rule(ConcurrencyRule::Single), "1");
        assert_eq!(describe_rule(ConcurrencyRule::UpTo(2)), "up to 2");
    }
}
