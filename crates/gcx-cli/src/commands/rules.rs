//! Rules command: list the active rule catalogue.

use std::io::Write;

use anyhow::Result;

use gcx_core::RuleRegistry;
use gcx_core::registry::RuleFile;

pub fn run<W: Write>(writer: &mut W, registry: &RuleRegistry, json: bool) -> Result<()> {
    if json {
        let file = RuleFile {
            rules: registry.rules().iter().map(gcx_core::EventRule::to_spec).collect(),
        };
        writeln!(writer, "{}", serde_json::to_string_pretty(&file)?)?;
        return Ok(());
    }

    for (index, rule) in registry.rules().iter().enumerate() {
        let role = if rule.throwaway() {
            "skip"
        } else if rule.endstamp() {
            "end"
        } else {
            "start"
        };
        writeln!(
            writer,
            "{index:>3}  {:<20} {role:<5}  {}",
            rule.kind().as_str(),
            rule.pattern().as_str()
        )?;
    }
    Ok(())
}
