//! SVG price chart with trade markers.
//!
//! Long opens are green up-triangles, long closes lime down-triangles,
//! short opens red down-triangles and short closes orange up-triangles.

use crate::domain::backtest::PricePoint;
use crate::domain::position::{Direction, TradeRecord};

const CHART_WIDTH: f64 = 1000.0;
const CHART_HEIGHT: f64 = 420.0;
const MARGIN_LEFT: f64 = 70.0;
const MARGIN_RIGHT: f64 = 20.0;
const MARGIN_TOP: f64 = 30.0;
const MARGIN_BOTTOM: f64 = 40.0;
const MARKER_SIZE: f64 = 6.0;

const PRICE_STROKE: &str = "#2563eb";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Marker {
    Up,
    Down,
}

struct Scale {
    first: i64,
    span: f64,
    min_price: f64,
    range: f64,
}

impl Scale {
    fn new(prices: &[PricePoint], trades: &[TradeRecord]) -> Self {
        let first = prices[0].timestamp.and_utc().timestamp();
        let last = prices[prices.len() - 1].timestamp.and_utc().timestamp();
        let values = prices
            .iter()
            .map(|p| p.close)
            .chain(trades.iter().flat_map(|t| [t.open_price, t.close_price]));
        let (min_price, max_price) = values.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
            (lo.min(v), hi.max(v))
        });
        Scale {
            first,
            span: ((last - first) as f64).max(1.0),
            min_price,
            range: (max_price - min_price).max(1e-6),
        }
    }

    fn x(&self, timestamp: chrono::NaiveDateTime) -> f64 {
        let plot_width = CHART_WIDTH - MARGIN_LEFT - MARGIN_RIGHT;
        let offset = (timestamp.and_utc().timestamp() - self.first) as f64;
        MARGIN_LEFT + (offset / self.span).clamp(0.0, 1.0) * plot_width
    }

    fn y(&self, price: f64) -> f64 {
        let plot_height = CHART_HEIGHT - MARGIN_TOP - MARGIN_BOTTOM;
        MARGIN_TOP + plot_height - ((price - self.min_price) / self.range) * plot_height
    }
}

/// Render closes as a polyline with one marker per trade open and close.
/// Returns an empty string when there are no prices.
pub fn generate_price_svg(prices: &[PricePoint], trades: &[TradeRecord], title: &str) -> String {
    if prices.is_empty() {
        return String::new();
    }
    let scale = Scale::new(prices, trades);

    let mut path_data = String::new();
    for (i, point) in prices.iter().enumerate() {
        let cmd = if i == 0 { "M" } else { " L" };
        path_data.push_str(&format!(
            "{} {:.1} {:.1}",
            cmd,
            scale.x(point.timestamp),
            scale.y(point.close)
        ));
    }

    let mut svg = String::new();
    svg.push_str(&format!(
        r##"<svg width="{w}" height="{h}" viewBox="0 0 {w} {h}" xmlns="http://www.w3.org/2000/svg">"##,
        w = CHART_WIDTH,
        h = CHART_HEIGHT
    ));
    svg.push_str("\n  <rect width=\"100%\" height=\"100%\" fill=\"white\"/>\n");
    svg.push_str(&format!(
        "  <text x=\"{}\" y=\"18\" font-size=\"14\" fill=\"#333\">{}</text>\n",
        MARGIN_LEFT,
        escape(title)
    ));
    push_axes(&mut svg, &scale);
    svg.push_str(&format!(
        "  <path d=\"{}\" fill=\"none\" stroke=\"{}\" stroke-width=\"1.2\"/>\n",
        path_data, PRICE_STROKE
    ));

    for trade in trades {
        let (open, close) = trade_styles(trade.trade_type);
        push_marker(
            &mut svg,
            scale.x(trade.open_time),
            scale.y(trade.open_price),
            open,
        );
        push_marker(
            &mut svg,
            scale.x(trade.close_time),
            scale.y(trade.close_price),
            close,
        );
    }

    push_legend(&mut svg);
    push_date_labels(&mut svg, prices);
    svg.push_str("</svg>\n");
    svg
}

fn trade_styles(direction: Direction) -> ((Marker, &'static str), (Marker, &'static str)) {
    match direction {
        Direction::Short => ((Marker::Down, "red"), (Marker::Up, "orange")),
        _ => ((Marker::Up, "green"), (Marker::Down, "lime")),
    }
}

fn push_marker(svg: &mut String, x: f64, y: f64, (marker, fill): (Marker, &str)) {
    let s = MARKER_SIZE;
    let points = match marker {
        Marker::Up => format!(
            "{:.1},{:.1} {:.1},{:.1} {:.1},{:.1}",
            x,
            y - s,
            x - s,
            y + s,
            x + s,
            y + s
        ),
        Marker::Down => format!(
            "{:.1},{:.1} {:.1},{:.1} {:.1},{:.1}",
            x,
            y + s,
            x - s,
            y - s,
            x + s,
            y - s
        ),
    };
    svg.push_str(&format!(
        "  <polygon points=\"{}\" fill=\"{}\" stroke=\"#333\" stroke-width=\"0.5\"/>\n",
        points, fill
    ));
}

fn push_axes(svg: &mut String, scale: &Scale) {
    let bottom = CHART_HEIGHT - MARGIN_BOTTOM;
    svg.push_str(&format!(
        "  <line x1=\"{l}\" y1=\"{t}\" x2=\"{l}\" y2=\"{b}\" stroke=\"#ccc\" stroke-width=\"1\"/>\n",
        l = MARGIN_LEFT,
        t = MARGIN_TOP,
        b = bottom
    ));
    svg.push_str(&format!(
        "  <line x1=\"{l}\" y1=\"{b}\" x2=\"{r}\" y2=\"{b}\" stroke=\"#ccc\" stroke-width=\"1\"/>\n",
        l = MARGIN_LEFT,
        b = bottom,
        r = CHART_WIDTH - MARGIN_RIGHT
    ));
    let max_price = scale.min_price + scale.range;
    for price in [max_price, (max_price + scale.min_price) / 2.0, scale.min_price] {
        svg.push_str(&format!(
            "  <text x=\"{:.1}\" y=\"{:.1}\" text-anchor=\"end\" font-size=\"10\" fill=\"#666\">{:.5}</text>\n",
            MARGIN_LEFT - 5.0,
            scale.y(price) + 3.0,
            price
        ));
    }
}

fn push_legend(svg: &mut String) {
    let entries = [
        ("Long open", (Marker::Up, "green")),
        ("Long close", (Marker::Down, "lime")),
        ("Short open", (Marker::Down, "red")),
        ("Short close", (Marker::Up, "orange")),
    ];
    let mut x = CHART_WIDTH - MARGIN_RIGHT - 400.0;
    for (label, style) in entries {
        push_marker(svg, x, 15.0, style);
        svg.push_str(&format!(
            "  <text x=\"{:.1}\" y=\"19\" font-size=\"10\" fill=\"#333\">{}</text>\n",
            x + 10.0,
            label
        ));
        x += 100.0;
    }
}

fn push_date_labels(svg: &mut String, prices: &[PricePoint]) {
    let y = CHART_HEIGHT - MARGIN_BOTTOM + 18.0;
    let first = prices[0].timestamp;
    let last = prices[prices.len() - 1].timestamp;
    svg.push_str(&format!(
        "  <text x=\"{}\" y=\"{}\" font-size=\"10\" fill=\"#666\">{}</text>\n",
        MARGIN_LEFT,
        y,
        first.format("%Y-%m-%d")
    ));
    svg.push_str(&format!(
        "  <text x=\"{}\" y=\"{}\" text-anchor=\"end\" font-size=\"10\" fill=\"#666\">{}</text>\n",
        CHART_WIDTH - MARGIN_RIGHT,
        y,
        last.format("%Y-%m-%d")
    ));
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}
