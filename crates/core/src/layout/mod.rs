//! Shortest-column masonry packing.
//!
//! Items of varying aspect ratio are dropped, in order, into whichever column
//! is currently shortest (lowest index wins ties). The computation is pure and
//! deterministic: identical inputs give bit-identical placements.

pub mod cache;

use serde::Serialize;

use crate::domain::{Dimensions, Entry};

pub use cache::LayoutCache;

/// Aspect ratio used for items whose size is unknown.
pub const DEFAULT_ASPECT_RATIO: f64 = 1.0;

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self { x, y, width, height }
    }

    pub fn max_x(&self) -> f64 {
        self.x + self.width
    }

    pub fn max_y(&self) -> f64 {
        self.y + self.height
    }

    /// True when the two rectangles overlap with positive area.
    pub fn intersects(&self, other: &Rect) -> bool {
        self.x < other.max_x()
            && other.x < self.max_x()
            && self.y < other.max_y()
            && other.y < self.max_y()
    }
}

/// One item to lay out. The ratio is height over width; `None` means unknown.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct AspectRatioItem {
    aspect_ratio: Option<f64>,
}

impl AspectRatioItem {
    /// Non-finite or non-positive ratios are treated as unknown.
    pub fn new(aspect_ratio: Option<f64>) -> Self {
        Self {
            aspect_ratio: aspect_ratio.filter(|r| r.is_finite() && *r > 0.0),
        }
    }

    pub fn unknown() -> Self {
        Self { aspect_ratio: None }
    }

    pub fn from_dimensions(dimensions: Option<Dimensions>) -> Self {
        Self::new(dimensions.and_then(|d| d.aspect_ratio()))
    }

    pub fn aspect_ratio(&self) -> Option<f64> {
        self.aspect_ratio
    }

    pub fn effective_ratio(&self) -> f64 {
        self.aspect_ratio.unwrap_or(DEFAULT_ASPECT_RATIO)
    }
}

impl From<&Entry> for AspectRatioItem {
    fn from(entry: &Entry) -> Self {
        Self::from_dimensions(entry.dimensions)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LayoutParams {
    pub column_count: usize,
    pub content_width: f64,
    pub cell_padding: f64,
}

impl LayoutParams {
    pub fn new(column_count: usize, content_width: f64, cell_padding: f64) -> Self {
        Self {
            column_count,
            content_width,
            cell_padding,
        }
    }

    pub fn column_width(&self) -> f64 {
        sanitize(self.content_width) / self.column_count.max(1) as f64
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Placement {
    pub column: usize,
    /// Cell rectangle already inset by the padding.
    pub rect: Rect,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct Layout {
    pub placements: Vec<Placement>,
    pub content_height: f64,
}

impl Layout {
    pub fn placement(&self, index: usize) -> Option<&Placement> {
        self.placements.get(index)
    }

    /// Items whose rectangle intersects `visible`, with their indices, in input order.
    pub fn placements_in<'a>(
        &'a self,
        visible: &'a Rect,
    ) -> impl Iterator<Item = (usize, &'a Placement)> + 'a {
        self.placements
            .iter()
            .enumerate()
            .filter(move |(_, p)| p.rect.intersects(visible))
    }
}

/// Pack `items` into `column_count` columns spanning `content_width`.
///
/// A zero column count is treated as one column; negative or non-finite
/// widths and paddings are treated as zero.
pub fn layout(
    items: &[AspectRatioItem],
    column_count: usize,
    content_width: f64,
    cell_padding: f64,
) -> Layout {
    layout_with(items, &LayoutParams::new(column_count, content_width, cell_padding))
}

pub fn layout_with(items: &[AspectRatioItem], params: &LayoutParams) -> Layout {
    let columns = params.column_count.max(1);
    let column_width = params.column_width();
    let padding = sanitize(params.cell_padding);
    let item_width = (column_width - 2.0 * padding).max(0.0);

    let mut heights = vec![0.0_f64; columns];
    let mut placements = Vec::with_capacity(items.len());

    for item in items {
        let column = shortest_column(&heights);
        let item_height = item_width * item.effective_ratio();
        let cell_height = item_height + 2.0 * padding;

        let rect = Rect::new(
            column as f64 * column_width + padding,
            heights[column] + padding,
            item_width,
            item_height,
        );
        placements.push(Placement { column, rect });
        heights[column] += cell_height;
    }

    let content_height = heights.iter().copied().fold(0.0, f64::max);
    Layout {
        placements,
        content_height,
    }
}

/// Column count by available width: 2 on phone-sized widths, 3 below 900, else 4.
pub fn columns_for_width(width: f64) -> usize {
    if width < 600.0 {
        2
    } else if width < 900.0 {
        3
    } else {
        4
    }
}

fn shortest_column(heights: &[f64]) -> usize {
    let mut best = 0;
    for (i, &h) in heights.iter().enumerate().skip(1) {
        if h < heights[best] {
            best = i;
        }
    }
    best
}

fn sanitize(v: f64) -> f64 {
    if v.is_finite() && v > 0.0 {
        v
    } else {
        0.0
    }
}
