//! Page and zoom state of the document viewer

use crate::settings::Settings;

/// Zoom bounds and step
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ZoomLimits {
    pub default: f32,
    pub step: f32,
    pub min: f32,
    pub max: f32,
}

impl Default for ZoomLimits {
    fn default() -> Self {
        Self { default: 1.2, step: 0.2, min: 0.6, max: 3.0 }
    }
}

impl From<&Settings> for ZoomLimits {
    fn from(settings: &Settings) -> Self {
        Self {
            default: settings.default_zoom,
            step: settings.zoom_step,
            min: settings.min_zoom,
            max: settings.max_zoom,
        }
    }
}

impl ZoomLimits {
    /// Replace unusable bounds with the defaults and order `min <= max`
    pub fn normalized(self) -> Self {
        let fallback = Self::default();
        let usable = |value: f32| value.is_finite() && value > 0.0;

        let (mut min, mut max) = if usable(self.min) && usable(self.max) {
            (self.min, self.max)
        } else {
            (fallback.min, fallback.max)
        };
        if min > max {
            std::mem::swap(&mut min, &mut max);
        }

        let normalized = Self {
            default: if usable(self.default) { self.default } else { fallback.default },
            step: if usable(self.step) { self.step } else { fallback.step },
            min,
            max,
        };
        if normalized != self {
            log::warn!("zoom limits {self:?} adjusted to {normalized:?}");
        }
        normalized
    }

    fn clamp(&self, zoom: f32) -> f32 {
        // Round to hundredths so repeated steps do not drift.
        ((zoom * 100.0).round() / 100.0).max(self.min).min(self.max)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Navigation {
    page_count: usize,
    /// 1-based; stays 1 for an empty document
    current_page: usize,
    zoom: f32,
    limits: ZoomLimits,
}

impl Navigation {
    pub fn new(page_count: usize, limits: ZoomLimits) -> Self {
        let limits = limits.normalized();
        Self { page_count, current_page: 1, zoom: limits.clamp(limits.default), limits }
    }

    pub fn page_count(&self) -> usize {
        self.page_count
    }

    pub fn current_page(&self) -> usize {
        self.current_page
    }

    pub fn zoom(&self) -> f32 {
        self.zoom
    }

    /// Returns whether the page changed
    pub fn next_page(&mut self) -> bool {
        self.set_page(self.current_page + 1)
    }

    /// Returns whether the page changed
    pub fn prev_page(&mut self) -> bool {
        self.set_page(self.current_page.saturating_sub(1))
    }

    /// Jump to `page`, clamped to the document bounds
    ///
    /// Returns whether the page changed.
    pub fn set_page(&mut self, page: usize) -> bool {
        let page = page.max(1).min(self.page_count.max(1));
        let changed = page != self.current_page;
        self.current_page = page;
        changed
    }

    /// Returns whether the zoom changed
    pub fn zoom_in(&mut self) -> bool {
        self.set_zoom(self.zoom + self.limits.step)
    }

    /// Returns whether the zoom changed
    pub fn zoom_out(&mut self) -> bool {
        self.set_zoom(self.zoom - self.limits.step)
    }

    pub fn set_zoom(&mut self, zoom: f32) -> bool {
        let zoom = self.limits.clamp(zoom);
        let changed = zoom != self.zoom;
        self.zoom = zoom;
        changed
    }

    /// Back to page 1 at the default zoom
    pub fn reset(&mut self, page_count: usize) {
        *self = Self::new(page_count, self.limits);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f32, b: f32) -> bool {
        (a - b).abs() < 1e-4
    }

    #[test]
    fn next_page_is_clamped_to_document_bounds() {
        let mut nav = Navigation::new(2, ZoomLimits::default());

        assert!(nav.next_page());
        assert!(!nav.next_page());
        assert_eq!(nav.current_page(), 2);

        assert!(nav.prev_page());
        assert!(!nav.prev_page());
        assert_eq!(nav.current_page(), 1);
    }

    #[test]
    fn set_page_is_clamped() {
        let mut nav = Navigation::new(3, ZoomLimits::default());

        nav.set_page(100);
        assert_eq!(nav.current_page(), 3);
        nav.set_page(0);
        assert_eq!(nav.current_page(), 1);
    }

    #[test]
    fn empty_document_stays_on_first_page() {
        let mut nav = Navigation::new(0, ZoomLimits::default());

        assert!(!nav.next_page());
        assert_eq!(nav.current_page(), 1);
    }

    #[test]
    fn zoom_steps_and_clamps() {
        let mut nav = Navigation::new(1, ZoomLimits::default());
        assert!(approx(nav.zoom(), 1.2));

        nav.zoom_in();
        assert!(approx(nav.zoom(), 1.4));

        for _ in 0..20 {
            nav.zoom_in();
        }
        assert!(approx(nav.zoom(), 3.0));
        assert!(!nav.zoom_in());

        for _ in 0..20 {
            nav.zoom_out();
        }
        assert!(approx(nav.zoom(), 0.6));
    }

    #[test]
    fn inverted_zoom_limits_are_reordered() {
        let settings = Settings { min_zoom: 3.0, max_zoom: 0.6, ..Settings::default() };
        let mut nav = Navigation::new(1, ZoomLimits::from(&settings));

        assert!(approx(nav.zoom(), 1.2));
        while nav.zoom_in() {}
        assert!(approx(nav.zoom(), 3.0));
        while nav.zoom_out() {}
        assert!(approx(nav.zoom(), 0.6));
    }

    #[test]
    fn unusable_zoom_limits_fall_back_to_defaults() {
        let limits = ZoomLimits { default: f32::NAN, step: 0.0, min: f32::NAN, max: -1.0 };
        assert_eq!(limits.normalized(), ZoomLimits::default());

        let nav = Navigation::new(1, limits);
        assert!(approx(nav.zoom(), 1.2));
    }

    #[test]
    fn reset_restores_defaults() {
        let mut nav = Navigation::new(5, ZoomLimits::default());
        nav.set_page(4);
        nav.zoom_in();

        nav.reset(2);
        assert_eq!(nav.page_count(), 2);
        assert_eq!(nav.current_page(), 1);
        assert!(approx(nav.zoom(), 1.2));
    }
}
