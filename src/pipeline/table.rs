//! HTML export for table cell grids.
//!
//! Procurement estimates are full of merged header cells that GFM pipe
//! tables cannot represent. Tables therefore travel as HTML fragments with
//! `rowspan`/`colspan` preserved.

use crate::pipeline::tree::{TableCell, TableGrid};

/// Rows beyond this index are dropped, whatever `num_rows` the engine claims.
pub const MAX_GRID_ROWS: usize = 65_536;

/// Render a cell grid as a single-line HTML table.
///
/// Each cell is emitted once, in the row where it starts, ordered by column.
/// Header cells (column or row headers) become `<th>`. Rows run to the last
/// row a cell starts in or spans into, bounded by `num_rows` and
/// [`MAX_GRID_ROWS`].
pub fn export_html(grid: &TableGrid) -> String {
    let limit = grid.num_rows.min(MAX_GRID_ROWS);
    let used = grid
        .cells
        .iter()
        .filter(|c| c.start_row < limit)
        .map(|c| c.start_row.saturating_add(c.row_span.max(1)).min(limit))
        .max()
        .unwrap_or(0);
    let mut rows: Vec<Vec<&TableCell>> = vec![Vec::new(); used];
    for cell in &grid.cells {
        if let Some(row) = rows.get_mut(cell.start_row) {
            row.push(cell);
        }
    }

    let mut html = String::from("<table><tbody>");
    for row in &mut rows {
        row.sort_by_key(|c| c.start_col);
        html.push_str("<tr>");
        for cell in row.iter() {
            let tag = if cell.column_header || cell.row_header {
                "th"
            } else {
                "td"
            };
            html.push('<');
            html.push_str(tag);
            if cell.row_span > 1 {
                html.push_str(&format!(" rowspan=\"{}\"", cell.row_span));
            }
            if cell.col_span > 1 {
                html.push_str(&format!(" colspan=\"{}\"", cell.col_span));
            }
            html.push('>');
            html.push_str(&escape(&cell.text));
            html.push_str("</");
            html.push_str(tag);
            html.push('>');
        }
        html.push_str("</tr>");
    }
    html.push_str("</tbody></table>");
    html
}

/// Escape text for HTML element content.
pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\n' => out.push_str("<br>"),
            _ => out.push(ch),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cell(text: &str, row: usize, col: usize) -> TableCell {
        TableCell {
            text: text.into(),
            start_row: row,
            start_col: col,
            row_span: 1,
            col_span: 1,
            column_header: false,
            row_header: false,
        }
    }

    #[test]
    fn merged_header_spans_columns() {
        let mut head = cell("Итого", 0, 0);
        head.col_span = 2;
        head.column_header = true;
        let grid = TableGrid {
            num_rows: 2,
            num_cols: 2,
            cells: vec![cell("2", 1, 1), head, cell("1", 1, 0)],
        };
        assert_eq!(
            export_html(&grid),
            "<table><tbody><tr><th colspan=\"2\">Итого</th></tr>\
             <tr><td>1</td><td>2</td></tr></tbody></table>"
        );
    }

    #[test]
    fn row_span_is_emitted_once() {
        let mut tall = cell("A", 0, 0);
        tall.row_span = 2;
        let grid = TableGrid {
            num_rows: 2,
            num_cols: 2,
            cells: vec![tall, cell("b", 0, 1), cell("c", 1, 1)],
        };
        let html = export_html(&grid);
        assert_eq!(html.matches("<td").count(), 3);
        assert!(html.contains("<td rowspan=\"2\">A</td>"));
    }

    #[test]
    fn cell_text_is_escaped() {
        let grid = TableGrid {
            num_rows: 1,
            num_cols: 1,
            cells: vec![cell("a < b & \"c\"", 0, 0)],
        };
        assert!(export_html(&grid).contains("a &lt; b &amp; &quot;c&quot;"));
    }

    #[test]
    fn cells_outside_grid_are_dropped() {
        let grid = TableGrid {
            num_rows: 1,
            num_cols: 1,
            cells: vec![cell("in", 0, 0), cell("out", 5, 0)],
        };
        assert!(!export_html(&grid).contains("out"));
    }

    #[test]
    fn oversized_row_count_is_bounded_by_cells() {
        let grid = TableGrid {
            num_rows: usize::MAX / 8,
            num_cols: 1,
            cells: vec![cell("a", 0, 0), cell("b", 1, 0), cell("far", usize::MAX / 16, 0)],
        };
        assert_eq!(
            export_html(&grid),
            "<table><tbody><tr><td>a</td></tr><tr><td>b</td></tr></tbody></table>"
        );
    }

    #[test]
    fn trailing_empty_rows_are_not_emitted() {
        let grid = TableGrid {
            num_rows: 4,
            num_cols: 1,
            cells: vec![cell("only", 0, 0)],
        };
        assert_eq!(export_html(&grid).matches("<tr>").count(), 1);
    }

    #[test]
    fn spanned_last_row_is_kept() {
        let mut tall = cell("A", 0, 0);
        tall.row_span = 2;
        let grid = TableGrid {
            num_rows: 2,
            num_cols: 1,
            cells: vec![tall],
        };
        assert_eq!(
            export_html(&grid),
            "<table><tbody><tr><td rowspan=\"2\">A</td></tr><tr></tr></tbody></table>"
        );
    }
}
