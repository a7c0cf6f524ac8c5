use super::{layout_with, AspectRatioItem, Layout, LayoutParams};

/// Memoizes the last computed layout.
///
/// The layout is recomputed only when the column count, content width,
/// padding or item list changes. Viewport height never invalidates it.
#[derive(Debug, Default)]
pub struct LayoutCache {
    key: Option<(LayoutParams, Vec<AspectRatioItem>)>,
    layout: Layout,
    computations: usize,
}

impl LayoutCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_or_compute(&mut self, items: &[AspectRatioItem], params: LayoutParams) -> &Layout {
        let fresh = matches!(&self.key, Some((p, i)) if *p == params && i.as_slice() == items);
        if !fresh {
            self.layout = layout_with(items, &params);
            self.key = Some((params, items.to_vec()));
            self.computations += 1;
            log::debug!(
                "event=layout_computed items={} columns={} width={}",
                items.len(),
                params.column_count,
                params.content_width
            );
        }
        &self.layout
    }

    /// Whether a viewport resize to `width` x `height` would require a new layout.
    pub fn needs_layout_for_bounds(&self, width: f64, _height: f64) -> bool {
        match &self.key {
            Some((params, _)) => params.content_width != width,
            None => true,
        }
    }

    pub fn invalidate(&mut self) {
        self.key = None;
    }

    /// Number of layouts computed so far.
    pub fn computations(&self) -> usize {
        self.computations
    }
}
