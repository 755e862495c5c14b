use std::collections::BTreeMap;

use crate::domain::{
    chart::{Color, IndicatorConfigSet, IndicatorId, LegendLine, PaneId, PaneLegend},
    market_data::TimeSeriesRecord,
};

const VOLUME_COLOR: Color = Color::from_hex(0x94a3b8);
const MACD_COLOR: Color = Color::from_hex(0x34d399);
const FORCE13_COLOR: Color = Color::from_hex(0x60a5fa);
const FORCE2_COLOR: Color = Color::from_hex(0xa78bfa);
const ABSENT: &str = "-";

/// Overlay values reported by the price surface itself, preferred over record columns
pub type OverlayValues = BTreeMap<IndicatorId, f64>;

fn fixed(value: Option<f64>, decimals: usize) -> String {
    value.map_or_else(|| ABSENT.to_string(), |v| format!("{:.*}", decimals, v))
}

fn scaled(value: Option<f64>, divisor: f64, decimals: usize, suffix: &str) -> String {
    value.map_or_else(|| ABSENT.to_string(), |v| format!("{:.*}{}", decimals, v / divisor, suffix))
}

fn price_legend(
    record: Option<&TimeSeriesRecord>,
    configs: &IndicatorConfigSet,
    overlay_values: &OverlayValues,
) -> LegendLine {
    let mut line = LegendLine::default();
    let field = |name: &str| record.and_then(|r| r.field(name));
    let down = match (field("Open"), field("Close")) {
        (Some(open), Some(close)) => open >= close,
        _ => false,
    };
    let value_color = if down { Color::DOWN } else { Color::UP };
    for (label, column) in [("O", "Open"), ("H", "High"), ("L", "Low"), ("C", "Close")] {
        line.push(label, Color::MUTED);
        line.push(fixed(field(column), 2), value_color);
    }

    for entry in configs.visible_overlays() {
        let value = overlay_values
            .get(&entry.id)
            .copied()
            .or_else(|| entry.column().and_then(|column| field(&column)));
        if let Some(value) = value {
            line.push(format!("{} {:.2}", entry.display_label(), value), entry.color.unwrap_or(Color::MUTED));
        }
    }
    line
}

fn pane_line(pane: PaneId, record: Option<&TimeSeriesRecord>) -> LegendLine {
    let field = |name: &str| record.and_then(|r| r.field(name));
    let mut line = LegendLine::default();
    match pane {
        PaneId::Price => {}
        PaneId::Volume => line.push(format!("VOL {}", scaled(field("Volume"), 1e6, 2, "M")), VOLUME_COLOR),
        PaneId::Macd => line.push(format!("MACD {}", fixed(field("macd_diff"), 2)), MACD_COLOR),
        PaneId::Force13 => line.push(format!("FORCE (13) {}", scaled(field("efi"), 1e6, 2, "M")), FORCE13_COLOR),
        PaneId::Force2 => line.push(format!("FORCE (2) {}", scaled(field("force_index_2"), 1e3, 1, "K")), FORCE2_COLOR),
    }
    line
}

/// Legend text for each visible pane from one resolved record.
/// Pure: the same record and configuration always render the same legends.
pub fn render_legends(
    record: Option<&TimeSeriesRecord>,
    configs: &IndicatorConfigSet,
    panes: &[PaneId],
    overlay_values: &OverlayValues,
) -> BTreeMap<PaneId, PaneLegend> {
    panes
        .iter()
        .map(|&pane| {
            let mut legend = PaneLegend::new(pane);
            let line = match pane {
                PaneId::Price => price_legend(record, configs, overlay_values),
                other => pane_line(other, record),
            };
            legend.lines.push(line);
            (pane, legend)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::chart::{IndicatorConfigEntry, IndicatorKind};

    fn configs() -> IndicatorConfigSet {
        IndicatorConfigSet::new(
            vec![
                IndicatorConfigEntry::moving_average("ema-13", IndicatorKind::Ema, 13).with_color(Color::from_hex(0xf59e0b)),
                IndicatorConfigEntry::moving_average("ema-26", IndicatorKind::Ema, 26).hidden(),
            ],
            vec![],
            vec![],
        )
    }

    #[test]
    fn price_line_uses_direction_color_and_visible_overlays() {
        let record = TimeSeriesRecord::new("2024-01-02")
            .with_ohlcv(10.0, 12.0, 9.0, 9.5, 2.5e6)
            .with_field("ema_13", 10.25)
            .with_field("ema_26", 11.0);
        let legends = render_legends(Some(&record), &configs(), &[PaneId::Price, PaneId::Volume], &OverlayValues::new());
        let price = &legends[&PaneId::Price].lines[0];
        assert_eq!(price.text(), "O 10.00 H 12.00 L 9.00 C 9.50 EMA(13) 10.25");
        assert_eq!(price.spans[1].color, Color::DOWN);
        assert_eq!(price.spans[0].color, Color::MUTED);
        assert_eq!(legends[&PaneId::Volume].text(), "VOL 2.50M");
    }

    #[test]
    fn series_value_wins_over_record_column() {
        let record = TimeSeriesRecord::new("2024-01-02").with_field("ema_13", 10.25);
        let mut values = OverlayValues::new();
        values.insert(IndicatorId::from("ema-13"), 10.5);
        let legends = render_legends(Some(&record), &configs(), &[PaneId::Price], &values);
        assert!(legends[&PaneId::Price].text().ends_with("EMA(13) 10.50"));
    }

    #[test]
    fn absent_values_render_as_dash() {
        let legends = render_legends(None, &configs(), &[PaneId::Price, PaneId::Force2], &OverlayValues::new());
        assert_eq!(legends[&PaneId::Price].text(), "O - H - L - C -");
        assert_eq!(legends[&PaneId::Force2].text(), "FORCE (2) -");
    }
}
