/// Text-aligned table extraction from the coefficient PDF.
///
/// The coefficient table has no ruled lines worth relying on, so cells are
/// recovered from where the text sits. Every text run on the page is placed
/// using the content stream's text and graphics matrices, and runs sharing a
/// baseline form a row. Within a row, abutting runs are merged into words
/// so glyph-by-glyph output reads as whole numbers. Words form a column when
/// their left, right or centre edges line up, which keeps right-aligned and
/// centred numbers together. Edges are snapped with `SNAP_TOLERANCE`.
///
/// Glyphs are decoded byte by byte, which is enough for the digits and
/// Latin labels of the IHM table but not for CID-keyed fonts. Fonts are not
/// measured either: run widths use an average glyph advance.

use lopdf::content::Content;
use lopdf::{Document, Object};

use crate::model::TideError;

/// Max distance, in points, for two runs to share a row or a column edge.
pub const SNAP_TOLERANCE: f64 = 3.0;

/// Max distance, in points, between the end of one run and the start of the
/// next for both to be read as one word.
pub const WORD_GAP: f64 = 1.5;

/// Estimated glyph advance as a fraction of the font size.
const AVG_GLYPH_EM: f64 = 0.5;

/// A piece of text placed on the page. `width` is an estimate.
#[derive(Debug, Clone, PartialEq)]
pub struct TextRun {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub text: String,
}

impl TextRun {
    fn right(&self) -> f64 {
        self.x + self.width
    }

    fn centre(&self) -> f64 {
        self.x + self.width / 2.0
    }
}

// ---------------------------------------------------------------------------
// Page geometry
// ---------------------------------------------------------------------------

/// 2D affine transform `[a b c d e f]` as used by PDF.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Matrix([f64; 6]);

impl Matrix {
    const IDENTITY: Matrix = Matrix([1.0, 0.0, 0.0, 1.0, 0.0, 0.0]);

    fn translation(tx: f64, ty: f64) -> Matrix {
        Matrix([1.0, 0.0, 0.0, 1.0, tx, ty])
    }

    /// `self × other`, i.e. apply `self` first.
    fn then(&self, other: &Matrix) -> Matrix {
        let [a, b, c, d, e, f] = self.0;
        let [a2, b2, c2, d2, e2, f2] = other.0;
        Matrix([
            a * a2 + b * c2,
            a * b2 + b * d2,
            c * a2 + d * c2,
            c * b2 + d * d2,
            e * a2 + f * c2 + e2,
            e * b2 + f * d2 + f2,
        ])
    }

    fn origin(&self) -> (f64, f64) {
        (self.0[4], self.0[5])
    }
}

fn number(obj: &Object) -> Option<f64> {
    match obj {
        Object::Integer(i) => Some(*i as f64),
        Object::Real(r) => Some(f64::from(*r)),
        _ => None,
    }
}

fn numbers<const N: usize>(operands: &[Object]) -> Option<[f64; N]> {
    let mut out = [0.0; N];
    if operands.len() < N {
        return None;
    }
    for (slot, obj) in out.iter_mut().zip(operands) {
        *slot = number(obj)?;
    }
    Some(out)
}

fn decode_bytes(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| b as char).collect()
}

/// Text shown by a `Tj`, `'`, `"` or `TJ` operand list, with its horizontal
/// advance in units of the font size.
fn shown_text(operator: &str, operands: &[Object]) -> (String, f64) {
    let mut text = String::new();
    let mut advance = 0.0;
    let shown = match operator {
        "\"" => operands.get(2),
        _ => operands.first(),
    };
    match shown {
        Some(Object::String(bytes, _)) => {
            text.push_str(&decode_bytes(bytes));
            advance += bytes.len() as f64 * AVG_GLYPH_EM;
        }
        Some(Object::Array(items)) => {
            for item in items {
                match item {
                    Object::String(bytes, _) => {
                        text.push_str(&decode_bytes(bytes));
                        advance += bytes.len() as f64 * AVG_GLYPH_EM;
                    }
                    other => {
                        if let Some(kerning) = number(other) {
                            advance -= kerning / 1000.0;
                            // Large negative kerning is a visual word gap.
                            if kerning < -200.0 {
                                text.push(' ');
                            }
                        }
                    }
                }
            }
        }
        _ => {}
    }
    (text, advance)
}

// ---------------------------------------------------------------------------
// Content stream walk
// ---------------------------------------------------------------------------

/// Collects the positioned text runs of the first page.
pub fn text_runs(pdf: &[u8]) -> Result<Vec<TextRun>, TideError> {
    let doc = Document::load_mem(pdf)?;
    let page_id = doc
        .get_pages()
        .values()
        .next()
        .copied()
        .ok_or_else(|| TideError::Pdf("document has no pages".to_string()))?;
    let content = Content::decode(&doc.get_page_content(page_id)?)?;

    let mut runs = Vec::new();
    let mut ctm = Matrix::IDENTITY;
    let mut font_size = 0.0;
    let mut saved = Vec::new();
    let mut text_matrix = Matrix::IDENTITY;
    let mut line_matrix = Matrix::IDENTITY;
    let mut leading = 0.0;

    for op in &content.operations {
        let operands = op.operands.as_slice();
        match op.operator.as_str() {
            "q" => saved.push((ctm, font_size)),
            "Q" => {
                (ctm, font_size) = saved.pop().unwrap_or((Matrix::IDENTITY, 0.0));
            }
            "cm" => {
                if let Some(m) = numbers::<6>(operands) {
                    ctm = Matrix(m).then(&ctm);
                }
            }
            "BT" => {
                text_matrix = Matrix::IDENTITY;
                line_matrix = Matrix::IDENTITY;
            }
            "Tm" => {
                if let Some(m) = numbers::<6>(operands) {
                    text_matrix = Matrix(m);
                    line_matrix = text_matrix;
                }
            }
            "Td" | "TD" => {
                if let Some([tx, ty]) = numbers::<2>(operands) {
                    if op.operator == "TD" {
                        leading = -ty;
                    }
                    line_matrix = Matrix::translation(tx, ty).then(&line_matrix);
                    text_matrix = line_matrix;
                }
            }
            "Tf" => {
                if let Some(size) = operands.get(1).and_then(number) {
                    font_size = size;
                }
            }
            "TL" => {
                if let Some([l]) = numbers::<1>(operands) {
                    leading = l;
                }
            }
            "T*" => {
                line_matrix = Matrix::translation(0.0, -leading).then(&line_matrix);
                text_matrix = line_matrix;
            }
            "Tj" | "TJ" | "'" | "\"" => {
                if op.operator != "Tj" && op.operator != "TJ" {
                    line_matrix = Matrix::translation(0.0, -leading).then(&line_matrix);
                    text_matrix = line_matrix;
                }
                let (text, advance_em) = shown_text(&op.operator, operands);
                let advance = advance_em * font_size;
                let placement = text_matrix.then(&ctm);
                if !text.trim().is_empty() {
                    let (x, y) = placement.origin();
                    runs.push(TextRun {
                        x,
                        y,
                        width: advance * placement.0[0],
                        text: text.trim().to_string(),
                    });
                }
                text_matrix = Matrix::translation(advance, 0.0).then(&text_matrix);
            }
            _ => {}
        }
    }

    Ok(runs)
}

// ---------------------------------------------------------------------------
// Alignment
// ---------------------------------------------------------------------------

/// Snaps `values` into clusters no wider than `tolerance` between
/// neighbours. Returns the cluster anchors in ascending order.
fn cluster_anchors(values: &mut [f64], tolerance: f64) -> Vec<f64> {
    values.sort_by(|a, b| a.total_cmp(b));
    let mut anchors: Vec<f64> = Vec::new();
    let mut last: Option<f64> = None;
    for &v in values.iter() {
        match last {
            Some(prev) if v - prev <= tolerance => {}
            _ => anchors.push(v),
        }
        last = Some(v);
    }
    anchors
}

fn anchor_index(anchors: &[f64], value: f64) -> usize {
    anchors
        .iter()
        .rposition(|&a| a <= value + f64::EPSILON)
        .unwrap_or(0)
}

/// Joins runs that abut on one baseline into words, left to right.
fn merge_words(mut row: Vec<TextRun>) -> Vec<TextRun> {
    row.sort_by(|a, b| a.x.total_cmp(&b.x));
    let mut words: Vec<TextRun> = Vec::with_capacity(row.len());
    for run in row {
        match words.last_mut() {
            Some(word) if (run.x - word.right()).abs() <= WORD_GAP => {
                word.width = run.right().max(word.right()) - word.x;
                word.text.push_str(&run.text);
            }
            _ => words.push(run),
        }
    }
    words
}

/// Edges of the word that opened a column.
#[derive(Debug, Clone, Copy)]
struct Column {
    left: f64,
    right: f64,
    centre: f64,
}

impl Column {
    fn of(word: &TextRun) -> Self {
        Column { left: word.x, right: word.right(), centre: word.centre() }
    }

    fn accepts(&self, word: &TextRun, tolerance: f64) -> bool {
        (word.x - self.left).abs() <= tolerance
            || (word.right() - self.right).abs() <= tolerance
            || (word.centre() - self.centre).abs() <= tolerance
    }
}

/// Arranges positioned runs into a grid of cells, top row first. Every row
/// has one cell per detected column; cells with no text are empty strings.
pub fn align_runs(runs: &[TextRun], tolerance: f64) -> Vec<Vec<String>> {
    if runs.is_empty() {
        return Vec::new();
    }
    // PDF y grows upwards; negate so rows come out top to bottom.
    let mut ys: Vec<f64> = runs.iter().map(|r| -r.y).collect();
    let rows = cluster_anchors(&mut ys, tolerance);

    let mut row_runs: Vec<Vec<TextRun>> = vec![Vec::new(); rows.len()];
    for run in runs {
        row_runs[anchor_index(&rows, -run.y)].push(run.clone());
    }
    let words: Vec<Vec<TextRun>> = row_runs.into_iter().map(merge_words).collect();

    let mut ordered: Vec<(usize, &TextRun)> = words
        .iter()
        .enumerate()
        .flat_map(|(row, row_words)| row_words.iter().map(move |w| (row, w)))
        .collect();
    ordered.sort_by(|a, b| a.1.x.total_cmp(&b.1.x));

    // Columns open in ascending left-edge order, so indices are already sorted.
    let mut columns: Vec<Column> = Vec::new();
    let mut placed = Vec::with_capacity(ordered.len());
    for (row, word) in ordered {
        let column = match columns.iter().position(|c| c.accepts(word, tolerance)) {
            Some(index) => index,
            None => {
                columns.push(Column::of(word));
                columns.len() - 1
            }
        };
        placed.push((row, column, word));
    }

    let mut grid = vec![vec![String::new(); columns.len()]; rows.len()];
    for (row, column, word) in placed {
        let cell = &mut grid[row][column];
        if !cell.is_empty() {
            cell.push(' ');
        }
        cell.push_str(&word.text);
    }
    grid
}

/// Extracts the table of the first page as a grid of text cells.
pub fn extract_table(pdf: &[u8]) -> Result<Vec<Vec<String>>, TideError> {
    let runs = text_runs(pdf)?;
    Ok(align_runs(&runs, SNAP_TOLERANCE))
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::content::Operation;
    use lopdf::{dictionary, Stream};

    /// A run set in a 10pt font.
    fn run(x: f64, y: f64, text: &str) -> TextRun {
        let width = text.len() as f64 * AVG_GLYPH_EM * 10.0;
        TextRun { x, y, width, text: text.to_string() }
    }

    fn text_ops(x: i64, y: i64, glyphs: &[&str]) -> Vec<Operation> {
        let mut ops = vec![
            Operation::new("BT", vec![]),
            Operation::new("Tf", vec!["F1".into(), 10.into()]),
            Operation::new("Td", vec![x.into(), y.into()]),
        ];
        for glyph in glyphs {
            ops.push(Operation::new("Tj", vec![Object::string_literal(*glyph)]));
        }
        ops.push(Operation::new("ET", vec![]));
        ops
    }

    /// Builds a one-page PDF whose content stream places `items` with `Td`.
    fn pdf_with_text(items: &[(i64, i64, &str)]) -> Vec<u8> {
        let operations = items
            .iter()
            .flat_map(|(x, y, text)| text_ops(*x, *y, &[*text]))
            .collect();
        pdf_with_operations(operations)
    }

    fn pdf_with_operations(operations: Vec<Operation>) -> Vec<u8> {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica",
        });
        let resources_id = doc.add_object(dictionary! {
            "Font" => dictionary! { "F1" => font_id },
        });

        let content = Content { operations };
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
        });
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => vec![page_id.into()],
                "Count" => 1,
                "Resources" => resources_id,
                "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);

        let mut bytes = Vec::new();
        doc.save_to(&mut bytes).unwrap();
        bytes
    }

    #[test]
    fn test_matrix_composition_applies_translation() {
        let m = Matrix::translation(10.0, 5.0).then(&Matrix([2.0, 0.0, 0.0, 2.0, 1.0, 1.0]));
        assert_eq!(m.origin(), (21.0, 11.0));
    }

    #[test]
    fn test_runs_on_same_baseline_share_a_row() {
        let runs = vec![
            run(50.0, 700.0, "1"),
            run(100.0, 701.5, "45 47"),
            run(150.0, 699.0, "52"),
            run(50.0, 688.0, "2"),
            run(101.0, 688.0, "48 50"),
        ];
        let grid = align_runs(&runs, SNAP_TOLERANCE);
        assert_eq!(grid.len(), 2);
        assert_eq!(grid[0], vec!["1", "45 47", "52"]);
        assert_eq!(grid[1], vec!["2", "48 50", ""]);
    }

    #[test]
    fn test_runs_in_one_column_are_joined_left_to_right() {
        let runs = vec![run(102.0, 700.0, "47"), run(100.0, 700.0, "45")];
        let grid = align_runs(&runs, SNAP_TOLERANCE);
        assert_eq!(grid, vec![vec!["45 47".to_string()]]);
    }

    #[test]
    fn test_empty_page_yields_empty_grid() {
        assert!(align_runs(&[], SNAP_TOLERANCE).is_empty());
    }

    #[test]
    fn test_kerning_gap_in_tj_array_becomes_space() {
        let operands = vec![Object::Array(vec![
            Object::string_literal("45"),
            Object::Integer(-600),
            Object::string_literal("47"),
            Object::Integer(-20),
            Object::string_literal("1"),
        ])];
        let (text, advance) = shown_text("TJ", &operands);
        assert_eq!(text, "45 471");
        // Five glyphs plus the two kerning shifts.
        assert!((advance - (5.0 * AVG_GLYPH_EM + 0.62)).abs() < 1e-9, "advance {}", advance);
    }

    #[test]
    fn test_right_aligned_values_share_a_column() {
        let runs = vec![
            run(50.0, 700.0, "1"),
            run(100.0, 700.0, "95 97"),
            run(50.0, 688.0, "2"),
            run(95.0, 688.0, "100 98"),
        ];
        let grid = align_runs(&runs, SNAP_TOLERANCE);
        assert_eq!(grid, vec![vec!["1", "95 97"], vec!["2", "100 98"]]);
    }

    #[test]
    fn test_centred_values_share_a_column() {
        let runs = vec![run(100.0, 700.0, "7 9"), run(105.0, 688.0, "8"), run(95.0, 676.0, "100 98")];
        let grid = align_runs(&runs, SNAP_TOLERANCE);
        assert_eq!(grid, vec![vec!["7 9"], vec!["8"], vec!["100 98"]]);
    }

    #[test]
    fn test_glyph_runs_are_merged_into_words() {
        let runs = vec![
            run(50.0, 700.0, "1"),
            run(100.0, 700.0, "9"),
            run(105.5, 700.0, "5"),
            run(114.0, 700.0, "9"),
            run(119.5, 700.0, "7"),
        ];
        let grid = align_runs(&runs, SNAP_TOLERANCE);
        assert_eq!(grid, vec![vec!["1", "95", "97"]]);
    }

    #[test]
    fn test_glyph_by_glyph_pdf_reads_whole_numbers() {
        let mut operations = text_ops(40, 780, &["1"]);
        operations.extend(text_ops(90, 780, &["9", "5"]));
        operations.extend(text_ops(110, 780, &["9", "7"]));
        let grid = extract_table(&pdf_with_operations(operations)).unwrap();
        assert_eq!(grid, vec![vec!["1", "95", "97"]]);

        let table = crate::coefficients::extract_coefficients(&grid, 2024).unwrap();
        assert_eq!(table.get("2024-01-01"), Some(&[95.0, 97.0][..]));
    }

    #[test]
    fn test_extract_table_reads_generated_pdf() {
        let pdf = pdf_with_text(&[
            (40, 800, "Dia"),
            (40, 780, "1"),
            (90, 780, "95 97"),
            (140, 780, "88 85"),
            (40, 765, "2"),
            (90, 765, "99 100"),
        ]);
        let grid = extract_table(&pdf).expect("generated PDF should parse");
        assert_eq!(grid.len(), 3);
        assert_eq!(grid[0][0], "Dia");
        assert_eq!(grid[1], vec!["1", "95 97", "88 85"]);
        assert_eq!(grid[2], vec!["2", "99 100", ""]);
    }

    #[test]
    fn test_garbage_bytes_are_a_pdf_error() {
        let result = extract_table(b"definitely not a pdf");
        assert!(matches!(result, Err(TideError::Pdf(_))), "got {:?}", result);
    }
}
