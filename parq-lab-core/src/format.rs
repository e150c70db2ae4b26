//! Text formatting shared by every command that prints to stdout.

use std::time::Duration;

use tabled::{
  builder::Builder,
  settings::{object::Segment, Alignment, Padding, Style},
};

const POWERS: [(u64, &str); 4] = [
  (1_000_000_000_000_000, "quadrillion"),
  (1_000_000_000_000, "trillion"),
  (1_000_000_000, "billion"),
  (1_000_000, "million"),
];

/// Humanized large number: `123455913` -> `123.5 million`. Numbers below a million are
/// printed as-is.
pub fn intword(value: u64) -> String {
  for (index, (power, name)) in POWERS.iter().enumerate() {
    if value >= *power {
      let chopped = value as f64 / *power as f64;
      let rounded = (chopped * 10.0).round() / 10.0;
      // 999.96 million rounds up to the next unit
      if rounded >= 1000.0 && index > 0 {
        let (next_power, next_name) = POWERS[index - 1];
        return format!("{:.1} {}", value as f64 / next_power as f64, next_name);
      }
      return format!("{rounded:.1} {name}");
    }
  }
  value.to_string()
}

/// `1234567` -> `1,234,567`
pub fn thousands(value: u64) -> String {
  let digits = value.to_string();
  let mut out = String::with_capacity(digits.len() + digits.len() / 3);
  for (idx, ch) in digits.chars().enumerate() {
    if idx > 0 && (digits.len() - idx) % 3 == 0 {
      out.push(',');
    }
    out.push(ch);
  }
  out
}

pub fn format_elapsed(elapsed: Duration) -> String {
  format!("Elapsed {:.4}", elapsed.as_secs_f64())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Justify {
  Left,
  Right,
}

/// Render a table with every cell left-justified to its column width. Trailing whitespace is
/// stripped from each line so that redirected output diffs cleanly.
pub fn render_left_justified<H: AsRef<str>>(headers: &[H], rows: &[Vec<String>]) -> String {
  render_table(headers, rows, Justify::Left)
}

/// Borderless table, columns separated by a single space.
pub fn render_table<H: AsRef<str>>(
  headers: &[H],
  rows: &[Vec<String>],
  justify: Justify,
) -> String {
  if headers.is_empty() && rows.is_empty() {
    return String::new();
  }
  let mut builder = Builder::default();
  builder.push_record(headers.iter().map(|h| h.as_ref().to_string()));
  for row in rows {
    builder.push_record(row.iter().cloned());
  }
  let alignment = match justify {
    Justify::Left => Alignment::left(),
    Justify::Right => Alignment::right(),
  };
  let mut table = builder.build();
  table
    .with(Style::empty())
    .modify(Segment::all(), Padding::new(0, 1, 0, 0))
    .modify(Segment::all(), alignment);
  let text = table.to_string();
  let lines: Vec<&str> = text.lines().map(str::trim_end).collect();
  lines.join("\n")
}

#[cfg(test)]
mod tests {
  use rstest::rstest;

  use super::*;

  #[rstest]
  #[case(999_999, "999999")]
  #[case(1_000_000, "1.0 million")]
  #[case(123_455_913, "123.5 million")]
  #[case(12_400_000_000, "12.4 billion")]
  #[case(999_960_000, "1.0 billion")]
  fn test_intword(#[case] value: u64, #[case] expected: &str) {
    assert_eq!(expected, intword(value));
  }

  #[rstest]
  #[case(0, "0")]
  #[case(999, "999")]
  #[case(1000, "1,000")]
  #[case(1_234_567, "1,234,567")]
  fn test_thousands(#[case] value: u64, #[case] expected: &str) {
    assert_eq!(expected, thousands(value));
  }

  #[test]
  fn test_format_elapsed() {
    assert_eq!("Elapsed 1.5000", format_elapsed(Duration::from_millis(1500)));
  }

  #[test]
  fn test_render_left_justified() {
    let rows = vec![
      vec!["Year".to_string(), "INT64".to_string()],
      vec!["Carrier".to_string(), "BYTE_ARRAY".to_string()],
    ];
    let text = render_left_justified(&["name", "physical_type"], &rows);
    let expected = "name    physical_type\n\
                    Year    INT64\n\
                    Carrier BYTE_ARRAY";
    assert_eq!(expected, text);
  }

  #[test]
  fn test_render_right_justified() {
    let rows = vec![
      vec!["1".to_string(), "5".to_string()],
      vec!["20".to_string(), "5".to_string()],
    ];
    let text = render_table(&["count", "total"], &rows, Justify::Right);
    assert_eq!("count total\n    1     5\n   20     5", text);
  }

  #[test]
  fn test_render_table_ragged_and_empty() {
    let rows = vec![vec!["São Paulo".to_string(), "3".to_string()], vec!["NYC".to_string()]];
    let text = render_left_justified(&["city", "flights"], &rows);
    assert_eq!("city      flights\nSão Paulo 3\nNYC", text);

    let empty: [&str; 0] = [];
    assert_eq!("", render_left_justified(&empty, &[]));
    assert_eq!("name", render_left_justified(&["name"], &[]));
  }
}
