use crate::models::{Comic, Thumbnail};
use ratatui::{
    Frame,
    layout::Rect,
    style::{Color, Modifier, Style},
    text::Line,
    widgets::{Block, Borders, Paragraph},
};

pub const GRID_COLUMNS: usize = 2;
const DEFAULT_CELL_HEIGHT: u16 = 6;
const MIN_CELL_HEIGHT: u16 = 4;
const MAX_CELL_HEIGHT: u16 = 12;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CellState {
    Loading,
    Loaded,
    Failed,
}

#[derive(Debug, Clone)]
pub struct Cell {
    pub number: u32,
    pub title: String,
    pub state: CellState,
    pub dimensions: Option<(u32, u32)>,
    pub has_color: bool,
}

impl Cell {
    fn new(comic: &Comic) -> Self {
        Self {
            number: comic.number,
            title: comic.title.clone(),
            state: CellState::Loading,
            dimensions: None,
            has_color: false,
        }
    }

    /// Cell height in rows, derived from the thumbnail's aspect ratio when
    /// known. A terminal cell is roughly twice as tall as it is wide.
    fn height(&self, column_width: u16) -> u16 {
        match self.dimensions {
            Some((width, height)) if width > 0 => {
                let rows = (column_width as u32).saturating_mul(height) / (width as u32 * 2);
                (rows as u16).clamp(MIN_CELL_HEIGHT, MAX_CELL_HEIGHT)
            }
            _ => DEFAULT_CELL_HEIGHT,
        }
    }
}

/// Two-column staggered grid of comic cells. Each cell is appended to the
/// currently-shorter column, so columns grow unevenly with the thumbnails.
pub struct StaggeredGrid {
    cells: Vec<Cell>,
    pub selected: usize,
    scroll: u16,
}

impl StaggeredGrid {
    pub fn new(comics: &[Comic]) -> Self {
        Self {
            cells: comics.iter().map(Cell::new).collect(),
            selected: 0,
            scroll: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn cell(&self, number: u32) -> Option<&Cell> {
        self.cells.iter().find(|c| c.number == number)
    }

    pub fn selected_number(&self) -> Option<u32> {
        self.cells.get(self.selected).map(|c| c.number)
    }

    pub fn set_thumbnail(&mut self, number: u32, thumbnail: &Thumbnail) {
        if let Some(cell) = self.cells.iter_mut().find(|c| c.number == number) {
            cell.state = CellState::Loaded;
            cell.dimensions = thumbnail.dimensions;
            cell.has_color = thumbnail.has_color;
        }
    }

    pub fn set_failed(&mut self, number: u32) {
        if let Some(cell) = self.cells.iter_mut().find(|c| c.number == number) {
            cell.state = CellState::Failed;
        }
    }

    pub fn select_next(&mut self) {
        if !self.cells.is_empty() {
            self.selected = (self.selected + 1).min(self.cells.len() - 1);
        }
    }

    pub fn select_prev(&mut self) {
        self.selected = self.selected.saturating_sub(1);
    }

    pub fn select_down(&mut self) {
        if !self.cells.is_empty() {
            self.selected = (self.selected + GRID_COLUMNS).min(self.cells.len() - 1);
        }
    }

    pub fn select_up(&mut self) {
        self.selected = self.selected.saturating_sub(GRID_COLUMNS);
    }

    /// Assign cells to columns: every cell lands in the column that is
    /// currently shorter, ties going left.
    pub fn column_assignment(&self, column_width: u16) -> [Vec<usize>; GRID_COLUMNS] {
        let mut columns: [Vec<usize>; GRID_COLUMNS] = [Vec::new(), Vec::new()];
        let mut heights = [0u32; GRID_COLUMNS];
        for (index, cell) in self.cells.iter().enumerate() {
            let col = if heights[0] <= heights[1] { 0 } else { 1 };
            columns[col].push(index);
            heights[col] += cell.height(column_width) as u32;
        }
        columns
    }

    pub fn render(&mut self, frame: &mut Frame, area: Rect, dim_monochrome: bool) {
        if self.cells.is_empty() {
            let empty = Paragraph::new(vec![
                Line::from("No comics in the database"),
                Line::from("Run a sync first, or open an article directly"),
            ])
            .style(Style::default().fg(Color::DarkGray).add_modifier(Modifier::ITALIC));
            frame.render_widget(empty, area);
            return;
        }

        let column_width = area.width / GRID_COLUMNS as u16;
        let columns = self.column_assignment(column_width);

        // Row offset of every cell within its column.
        let mut offsets = vec![0u16; self.cells.len()];
        for column in &columns {
            let mut y = 0u16;
            for &index in column {
                offsets[index] = y;
                y = y.saturating_add(self.cells[index].height(column_width));
            }
        }

        // Keep the selected cell in view.
        let sel_y = offsets[self.selected];
        let sel_h = self.cells[self.selected].height(column_width);
        if sel_y < self.scroll {
            self.scroll = sel_y;
        } else if sel_y + sel_h > self.scroll + area.height {
            self.scroll = (sel_y + sel_h).saturating_sub(area.height);
        }

        for (col, column) in columns.iter().enumerate() {
            for &index in column {
                let cell = &self.cells[index];
                let height = cell.height(column_width);
                let y = offsets[index];
                if y < self.scroll || y + height > self.scroll + area.height {
                    continue;
                }
                let rect = Rect::new(
                    area.x + col as u16 * column_width,
                    area.y + (y - self.scroll),
                    column_width,
                    height,
                );
                self.render_cell(frame, rect, index, dim_monochrome);
            }
        }
    }

    fn render_cell(&self, frame: &mut Frame, area: Rect, index: usize, dim_monochrome: bool) {
        let cell = &self.cells[index];

        let mut style = Style::default();
        if dim_monochrome && cell.state == CellState::Loaded && !cell.has_color {
            style = style.add_modifier(Modifier::DIM);
        }
        let mut block = Block::default()
            .borders(Borders::ALL)
            .title(format!("{} {}", cell.number, cell.title))
            .style(style);
        if index == self.selected {
            block = block.border_style(Style::default().fg(Color::Yellow));
        }

        let inner = block.inner(area);
        frame.render_widget(block, area);

        let body = match cell.state {
            CellState::Loading => Paragraph::new("…")
                .style(Style::default().fg(Color::DarkGray)),
            CellState::Failed => Paragraph::new("unavailable")
                .style(Style::default().fg(Color::DarkGray).add_modifier(Modifier::ITALIC)),
            CellState::Loaded => {
                let fill = "▒".repeat(inner.width as usize);
                let mut lines: Vec<Line> = (0..inner.height.saturating_sub(1))
                    .map(|_| Line::from(fill.clone()))
                    .collect();
                if let Some((w, h)) = cell.dimensions {
                    lines.push(Line::from(format!("{w}×{h}")));
                }
                Paragraph::new(lines)
            }
        };
        frame.render_widget(body, inner);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn comic(number: u32) -> Comic {
        Comic {
            number,
            title: format!("Comic {number}"),
            url: format!("https://imgs.xkcd.com/comics/{number}.png"),
        }
    }

    fn thumbnail(dimensions: Option<(u32, u32)>) -> Thumbnail {
        Thumbnail {
            dimensions,
            bytes: Vec::new(),
            has_color: false,
        }
    }

    #[test]
    fn test_cells_start_loading_with_default_height() {
        let grid = StaggeredGrid::new(&[comic(1), comic(2)]);
        assert_eq!(grid.len(), 2);
        assert_eq!(grid.cell(1).unwrap().state, CellState::Loading);
        assert_eq!(grid.cell(1).unwrap().height(40), DEFAULT_CELL_HEIGHT);
    }

    #[test]
    fn test_height_follows_aspect_ratio() {
        let mut grid = StaggeredGrid::new(&[comic(1)]);
        // A tall image: 100 wide, 100 tall at column width 40 → 20 rows,
        // clamped to the maximum.
        grid.set_thumbnail(1, &thumbnail(Some((100, 100))));
        assert_eq!(grid.cell(1).unwrap().height(40), MAX_CELL_HEIGHT);

        // A wide strip: 400x100 at column width 40 → 5 rows.
        grid.set_thumbnail(1, &thumbnail(Some((400, 100))));
        assert_eq!(grid.cell(1).unwrap().height(40), 5);
    }

    #[test]
    fn test_staggered_assignment_prefers_shorter_column() {
        let comics: Vec<Comic> = (1..=4).map(comic).collect();
        let mut grid = StaggeredGrid::new(&comics);
        // Cell 1 is tall, the rest short.
        grid.set_thumbnail(1, &thumbnail(Some((100, 100)))); // 12 rows
        grid.set_thumbnail(2, &thumbnail(Some((400, 100)))); // 5 rows
        grid.set_thumbnail(3, &thumbnail(Some((400, 100)))); // 5 rows
        grid.set_thumbnail(4, &thumbnail(Some((400, 100)))); // 5 rows

        let columns = grid.column_assignment(40);
        // 1 → left (tie). 2 → right (0 < 12). 3 → right (5 < 12).
        // 4 → right (10 < 12).
        assert_eq!(columns[0], vec![0]);
        assert_eq!(columns[1], vec![1, 2, 3]);
    }

    #[test]
    fn test_even_heights_alternate_columns() {
        let comics: Vec<Comic> = (1..=4).map(comic).collect();
        let grid = StaggeredGrid::new(&comics);
        let columns = grid.column_assignment(40);
        assert_eq!(columns[0], vec![0, 2]);
        assert_eq!(columns[1], vec![1, 3]);
    }

    #[test]
    fn test_set_failed_keeps_cell_in_grid() {
        let mut grid = StaggeredGrid::new(&[comic(1)]);
        grid.set_failed(1);
        assert_eq!(grid.cell(1).unwrap().state, CellState::Failed);
        assert_eq!(grid.len(), 1);
    }

    #[test]
    fn test_thumbnail_for_unknown_number_is_ignored() {
        let mut grid = StaggeredGrid::new(&[comic(1)]);
        grid.set_thumbnail(99, &thumbnail(Some((10, 10))));
        assert_eq!(grid.cell(1).unwrap().state, CellState::Loading);
    }

    #[test]
    fn test_selection_movement_clamps() {
        let comics: Vec<Comic> = (1..=3).map(comic).collect();
        let mut grid = StaggeredGrid::new(&comics);
        assert_eq!(grid.selected_number(), Some(1));

        grid.select_prev();
        assert_eq!(grid.selected, 0);

        grid.select_next();
        grid.select_next();
        grid.select_next();
        assert_eq!(grid.selected, 2);

        grid.select_up();
        assert_eq!(grid.selected, 0);

        grid.select_down();
        assert_eq!(grid.selected, 2);
    }

    #[test]
    fn test_empty_grid() {
        let grid = StaggeredGrid::new(&[]);
        assert!(grid.is_empty());
        assert_eq!(grid.selected_number(), None);
    }
}
