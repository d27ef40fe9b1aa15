/// A cell on the physical panel, addressed the way the panel driver takes it:
/// `row` is the canvas's horizontal coordinate and `col` its vertical one.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct PanelPoint {
    pub row: usize,
    pub col: usize,
}

impl PanelPoint {
    /// `(x, y)` on a canvas that is `width` cells across.
    pub const fn canvas_xy(self) -> (usize, usize) {
        (self.row, self.col)
    }
}

/// Maps source frame coordinates onto the panel, turned half a revolution to
/// match how the modules are mounted:
///
/// ```text
/// row = panel_height - y - 1
/// col = panel_width  - x - 1
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Rotate180 {
    panel_width: usize,
    panel_height: usize,
}

impl Rotate180 {
    pub const fn new(panel_width: usize, panel_height: usize) -> Self {
        Self {
            panel_width,
            panel_height,
        }
    }

    /// `None` when the source cell has no place on the panel. On a square
    /// panel of the frame's size every cell lands somewhere.
    pub fn apply(&self, x: usize, y: usize) -> Option<PanelPoint> {
        let row = self.panel_height.checked_sub(y)?.checked_sub(1)?;
        let col = self.panel_width.checked_sub(x)?.checked_sub(1)?;
        (row < self.panel_width && col < self.panel_height)
            .then_some(PanelPoint { row, col })
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use proptest::prelude::*;
    use std::collections::HashSet;

    #[test]
    fn test_corners() {
        let transform = Rotate180::new(64, 64);
        assert_eq!(transform.apply(0, 0), Some(PanelPoint { row: 63, col: 63 }));
        assert_eq!(transform.apply(63, 63), Some(PanelPoint { row: 0, col: 0 }));
        assert_eq!(transform.apply(63, 0), Some(PanelPoint { row: 63, col: 0 }));
        assert_eq!(transform.apply(0, 63), Some(PanelPoint { row: 0, col: 63 }));
    }

    #[test]
    fn test_bijection_on_matched_panel() {
        let transform = Rotate180::new(64, 64);
        let mut seen = HashSet::new();
        for x in 0..64 {
            for y in 0..64 {
                let point = transform.apply(x, y).unwrap();
                assert!(point.row < 64 && point.col < 64);
                assert!(seen.insert(point), "{:?} hit twice", point);
            }
        }
        assert_eq!(seen.len(), 64 * 64);
    }

    #[test]
    fn test_second_source_row_lands_on_canvas_column() {
        let transform = Rotate180::new(64, 64);
        let point = transform.apply(0, 1).unwrap();
        assert_eq!(point, PanelPoint { row: 62, col: 63 });
        assert_eq!(point.canvas_xy(), (62, 63));
    }

    #[test]
    fn test_smaller_panel_drops_outside_cells() {
        let transform = Rotate180::new(32, 16);
        assert_eq!(transform.apply(16, 0), Some(PanelPoint { row: 15, col: 15 }));
        assert_eq!(transform.apply(31, 15), Some(PanelPoint { row: 0, col: 0 }));
        // would need canvas y 31 on a 16 high canvas
        assert_eq!(transform.apply(0, 0), None);
        assert_eq!(transform.apply(32, 0), None);
        assert_eq!(transform.apply(0, 16), None);
        assert_eq!(transform.apply(63, 63), None);
    }

    #[test]
    fn test_wide_panel_only_takes_cells_that_fit_its_height() {
        let transform = Rotate180::new(128, 64);
        assert_eq!(transform.apply(0, 0), None);
        assert_eq!(transform.apply(64, 0), Some(PanelPoint { row: 63, col: 63 }));
        assert_eq!(transform.apply(127, 63), Some(PanelPoint { row: 0, col: 0 }));
    }

    proptest! {
        #[test]
        fn applying_twice_is_identity(x in 0usize..64, y in 0usize..64) {
            let transform = Rotate180::new(64, 64);
            let once = transform.apply(x, y).unwrap();
            let twice = transform.apply(once.row, once.col).unwrap();
            prop_assert_eq!((twice.row, twice.col), (x, y));
        }

        #[test]
        fn in_range_results_stay_on_panel(
            width in 1usize..200,
            height in 1usize..200,
            x in 0usize..256,
            y in 0usize..256,
        ) {
            let transform = Rotate180::new(width, height);
            let fits = x < width
                && y < height
                && height - y - 1 < width
                && width - x - 1 < height;
            match transform.apply(x, y) {
                Some(point) => {
                    prop_assert!(fits);
                    prop_assert!(point.row < width && point.col < height);
                }
                None => prop_assert!(!fits),
            }
        }
    }
}
