//! Wiki markup emitter

use crate::table::{Cell, TableFrame, WikiTable};
use std::fmt::Write;

const STUB_NOTICE: &str = "Users still running older versions of iOS (up to 9.3.5) are now presented with a [http://appldnld.apple.com/ios9/031-21276-20150906-9C5374F6-0D6F-4CEC-A322-668F61700CC9/com_apple_MobileAsset_OTARescueAsset/f393ae5156319e127a2b21d2f85b66a151c44ff5.zip dummy update file], and are instructed to use [[iTunes]] to install software updates.";

const TABLE_OPEN: &str = "{| class=\"wikitable\" style=\"font-size: smaller; text-align: center;\"";

/// Render a laid-out table as wiki markup
pub fn emit(table: &WikiTable) -> String {
    let mut out = String::new();

    if let Some(frame) = &table.frame {
        emit_frame(&mut out, frame);
        out.push_str("|-\n");
        for column in &table.columns {
            if let Some(header) = column.header() {
                let _ = writeln!(out, "! {header}");
            }
        }
    }

    for row in &table.rows {
        out.push_str("|-\n");
        for cell in &row.cells {
            out.push_str(&cell_markup(cell));
            out.push('\n');
        }
    }

    if table.frame.is_some() {
        out.push_str("|}");
    }

    out
}

fn emit_frame(out: &mut String, frame: &TableFrame) {
    let heading = &frame.heading;
    let marks = "=".repeat(heading.level);

    match &heading.name {
        Some(name) => {
            let _ = writeln!(out, "{marks} [[{}|{name}]] {marks}", heading.model);
        }
        None => {
            let _ = writeln!(out, "{marks} [[{}]] {marks}", heading.model);
        }
    }

    if frame.stub_notice {
        let _ = writeln!(out, "{STUB_NOTICE}\n");
    }

    let _ = writeln!(out, "{TABLE_OPEN}");
}

/// Markup for one cell, on a single line
pub fn cell_markup(cell: &Cell) -> String {
    let mut line = String::from("| ");

    if cell.rowspan > 1 {
        let _ = write!(line, "rowspan=\"{}\" ", cell.rowspan);
    }

    if cell.colspan > 1 {
        let _ = write!(line, "colspan=\"{}\" {}", cell.colspan, cell.content);
    } else if cell.rowspan > 1 {
        let _ = write!(line, "| {}", cell.content);
    } else {
        line.push_str(&cell.content);
    }

    line.trim_end().to_string()
}
