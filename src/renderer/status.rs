use super::layout::Viewport;
use crate::sync::RateStats;

/// Per-render figures shown under the image.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct StatusReport {
    pub arrival: RateStats,
    pub render: RateStats,
    pub frame_size: Option<(u32, u32)>,
    pub viewport: Viewport,
}

impl StatusReport {
    pub fn port_line(&self) -> String {
        let (w, h) = self.frame_size.unwrap_or((0, 0));
        format!("Port: {} (size: {}x{})", rate_text(self.arrival), w, h)
    }

    pub fn display_line(&self) -> String {
        format!(
            "Display: {} (size: {}x{})",
            rate_text(self.render),
            self.viewport.width,
            self.viewport.height
        )
    }
}

/// Last hovered pixel and its colour.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelReadout {
    pub x: u32,
    pub y: u32,
    pub rgba: [u8; 4],
}

impl PixelReadout {
    pub fn hex_rgba(&self) -> String {
        let [r, g, b, a] = self.rgba;
        format!("#{:02X}{:02X}{:02X}{:02X}", r, g, b, a)
    }

    pub fn line(&self) -> String {
        format!("Pixel: {} @ {},{}", self.hex_rgba(), self.x, self.y)
    }

    pub fn patch_color(&self) -> (u8, u8, u8) {
        (self.rgba[0], self.rgba[1], self.rgba[2])
    }
}

fn rate_text(stats: RateStats) -> String {
    format!(
        "{:.1} ({:.1}..{:.1}) Hz",
        stats.avg_rate, stats.min_rate, stats.max_rate
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_lines() {
        let report = StatusReport {
            arrival: RateStats { avg_rate: 50.0, min_rate: 1000.0 / 30.0, max_rate: 100.0 },
            render: RateStats::default(),
            frame_size: Some((640, 480)),
            viewport: Viewport::new(160, 90),
        };
        assert_eq!(report.port_line(), "Port: 50.0 (33.3..100.0) Hz (size: 640x480)");
        assert_eq!(report.display_line(), "Display: 0.0 (0.0..0.0) Hz (size: 160x90)");
    }

    #[test]
    fn test_missing_frame_reports_zero_size() {
        let report = StatusReport::default();
        assert!(report.port_line().ends_with("(size: 0x0)"));
    }

    #[test]
    fn test_pixel_readout_hex() {
        let px = PixelReadout { x: 3, y: 7, rgba: [255, 8, 171, 0] };
        assert_eq!(px.hex_rgba(), "#FF08AB00");
        assert_eq!(px.line(), "Pixel: #FF08AB00 @ 3,7");
        assert_eq!(px.patch_color(), (255, 8, 171));
    }
}
