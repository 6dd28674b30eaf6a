use super::ui;
use crate::core::rate::ProviderDescriptor;
use comfy_table::{Cell, Color};

pub fn run(providers: &[ProviderDescriptor]) {
    println!("{}", render(providers));
}

pub fn render(providers: &[ProviderDescriptor]) -> String {
    let mut table = ui::new_styled_table();
    table.set_header(vec![
        ui::header_cell("Identifier"),
        ui::header_cell("Country"),
        ui::header_cell("Bank"),
        ui::header_cell("Quote"),
    ]);
    for provider in providers {
        table.add_row(vec![
            Cell::new(&provider.key).fg(Color::Cyan),
            Cell::new(&provider.country).fg(Color::Magenta),
            Cell::new(&provider.display_name).fg(Color::Green),
            Cell::new(&provider.quote_currency),
        ]);
    }
    format!(
        "{}\n{table}",
        ui::style_text("Available Providers", ui::StyleType::Title)
    )
}
