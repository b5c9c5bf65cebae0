//! Character-cell output surface.
//!
//! The view only ever writes to the screen through [`Surface`]; it never reads
//! terminal state back. [`GridSurface`] keeps the cells in a
//! `ratatui::buffer::Buffer` so the front end can render it as a widget and
//! tests can inspect it.

use ratatui::buffer::Buffer;
use ratatui::layout::Rect;
use ratatui::style::{Modifier, Style};
use ratatui::widgets::Widget;

pub trait Surface {
    /// `(rows, cols)`
    fn size(&self) -> (usize, usize);

    fn put(&mut self, row: usize, col: usize, byte: u8);

    /// Reverse video for subsequent `put`s.
    fn set_reverse(&mut self, on: bool);

    fn clear_to_eol(&mut self, row: usize, col: usize);

    fn place_cursor(&mut self, row: usize, col: usize);
}

/// A grid of cells backed by a ratatui buffer
#[derive(Debug, Clone)]
pub struct GridSurface {
    cells: Buffer,
    reverse: bool,
    cursor: (usize, usize),
}

impl GridSurface {
    pub fn new(rows: usize, cols: usize) -> Self {
        let area = Rect::new(0, 0, cols as u16, rows as u16);
        Self {
            cells: Buffer::empty(area),
            reverse: false,
            cursor: (0, 0),
        }
    }

    pub fn cursor(&self) -> (usize, usize) {
        self.cursor
    }

    /// Text of one row, trailing blanks included.
    pub fn row_text(&self, row: usize) -> String {
        let (_, cols) = self.size();
        (0..cols)
            .map(|col| {
                self.cells
                    .cell((col as u16, row as u16))
                    .map(|cell| cell.symbol().to_string())
                    .unwrap_or_default()
            })
            .collect()
    }

    pub fn is_reversed(&self, row: usize, col: usize) -> bool {
        self.cells
            .cell((col as u16, row as u16))
            .is_some_and(|cell| cell.modifier.contains(Modifier::REVERSED))
    }

    /// All rows, for comparing whole screens.
    pub fn lines(&self) -> Vec<String> {
        let (rows, _) = self.size();
        (0..rows).map(|row| self.row_text(row)).collect()
    }
}

impl Surface for GridSurface {
    fn size(&self) -> (usize, usize) {
        let area = self.cells.area;
        (area.height as usize, area.width as usize)
    }

    fn put(&mut self, row: usize, col: usize, byte: u8) {
        let reverse = self.reverse;
        if let Some(cell) = self.cells.cell_mut((col as u16, row as u16)) {
            cell.reset();
            cell.set_char(byte as char);
            if reverse {
                cell.set_style(Style::default().add_modifier(Modifier::REVERSED));
            }
        }
    }

    fn set_reverse(&mut self, on: bool) {
        self.reverse = on;
    }

    fn clear_to_eol(&mut self, row: usize, col: usize) {
        let (_, cols) = self.size();
        for c in col..cols {
            if let Some(cell) = self.cells.cell_mut((c as u16, row as u16)) {
                cell.reset();
            }
        }
    }

    fn place_cursor(&mut self, row: usize, col: usize) {
        self.cursor = (row, col);
    }
}

impl Widget for &GridSurface {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let (rows, cols) = self.size();
        for y in 0..(rows as u16).min(area.height) {
            for x in 0..(cols as u16).min(area.width) {
                if let (Some(src), Some(dst)) = (
                    self.cells.cell((x, y)),
                    buf.cell_mut((area.x + x, area.y + y)),
                ) {
                    *dst = src.clone();
                }
            }
        }
    }
}
