//! Borderless, left-aligned tables for list commands.

const PADDING: &str = "   ";

/// Render `rows` under `header`, one line per row.
///
/// Headers are upper-cased. An empty row renders as a blank separator line.
pub fn render(header: &[&str], rows: &[Vec<String>]) -> String {
    let columns = header.len();
    let mut widths: Vec<usize> = header.iter().map(|h| h.chars().count()).collect();
    for row in rows {
        for (i, cell) in row.iter().take(columns).enumerate() {
            widths[i] = widths[i].max(cell.chars().count());
        }
    }

    let header: Vec<String> = header.iter().map(|h| h.to_uppercase()).collect();
    let mut lines = Vec::with_capacity(rows.len() + 1);
    lines.push(line(&header, &widths));
    for row in rows {
        lines.push(line(row, &widths));
    }
    lines.join("\n")
}

fn line(cells: &[String], widths: &[usize]) -> String {
    let mut out = String::new();
    for (i, width) in widths.iter().enumerate() {
        let cell = cells.get(i).map(String::as_str).unwrap_or("");
        if i > 0 {
            out.push_str(PADDING);
        }
        out.push_str(cell);
        out.extend(std::iter::repeat(' ').take(width - cell.chars().count()));
    }
    out.trim_end().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(cells: &[&str]) -> Vec<String> {
        cells.iter().map(|c| c.to_string()).collect()
    }

    #[test]
    fn test_columns_aligned() {
        let out = render(
            &["Name", "Roles"],
            &[row(&["alice", "user,node"]), row(&["bob", "reader"])],
        );
        assert_eq!(
            out,
            "NAME    ROLES\n\
             alice   user,node\n\
             bob     reader"
        );
    }

    #[test]
    fn test_blank_separator_row() {
        let out = render(&["UUID", "User"], &[row(&["a1", "bob"]), vec![], row(&["b2", "eve"])]);
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines, vec!["UUID   USER", "a1     bob", "", "b2     eve"]);
    }
}
