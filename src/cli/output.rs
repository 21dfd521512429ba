use colored::{ColoredString, Colorize};
use serde_json::Value;
use std::fmt;

/// Turns off ANSI colors for the rest of the process.
pub fn disable_colors() {
    colored::control::set_override(false);
}

pub fn section(title: impl fmt::Display) {
    println!("\n{}", format!("=== {} ===", title.to_string().trim()).bold());
}

pub fn info(message: impl fmt::Display) {
    println!("{}", message);
}

pub fn success(message: impl fmt::Display) {
    println!("{}", format!("[ok] {}", message).bright_green());
}

pub fn warning(message: impl fmt::Display) {
    println!("{}", format!("[!] {}", message).bright_yellow());
}

pub fn error(message: impl fmt::Display) {
    eprintln!("{}", format!("ERROR: {}", message).bright_red());
}

/// Paints `text` with the palette name carried in a view's `status_color`.
pub fn paint(text: &str, color: &str) -> ColoredString {
    match color {
        "primary" => text.bright_blue(),
        "secondary" => text.dimmed(),
        "success" => text.bright_green(),
        "info" => text.bright_cyan(),
        "warning" => text.bright_yellow(),
        "danger" => text.bright_red(),
        _ => text.normal(),
    }
}

/// Reads a display string out of a view field; missing or null fields render as `-`.
pub fn field(view: &serde_json::Map<String, Value>, key: &str) -> String {
    match view.get(key) {
        Some(Value::String(text)) => text.clone(),
        Some(Value::Null) | None => "-".into(),
        Some(other) => other.to_string(),
    }
}

/// Status cell colored by the view's own `status_color`.
pub fn status_cell(view: &serde_json::Map<String, Value>) -> ColoredString {
    let status = field(view, "status");
    let color = field(view, "status_color");
    paint(&status, &color)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn fields_render_strings_numbers_and_nulls() {
        let view = json!({ "number": "F202405-0001", "days": 3, "pet_name": null })
            .as_object()
            .cloned()
            .unwrap();
        assert_eq!(field(&view, "number"), "F202405-0001");
        assert_eq!(field(&view, "days"), "3");
        assert_eq!(field(&view, "pet_name"), "-");
        assert_eq!(field(&view, "missing"), "-");
    }

    #[test]
    fn unknown_palette_names_stay_plain() {
        disable_colors();
        assert_eq!(paint("Paid", "success").to_string(), "Paid");
        assert_eq!(paint("Paid", "mauve").to_string(), "Paid");
    }
}
