//! Painted needle gauge. Rotation 0 points straight up; the dial sweeps
//! from -90 (left) to +90 (right) degrees.

use eframe::egui;
use shared::domain::MAX_SENSOR_ANGLE;

const DIAL_SEGMENTS: usize = 48;
const MAJOR_TICKS: usize = 4;

#[derive(Debug, Clone, Copy)]
pub struct GaugeColors {
    pub dial: egui::Color32,
    pub tick: egui::Color32,
    pub needle: egui::Color32,
    pub hub: egui::Color32,
    pub label: egui::Color32,
}

impl Default for GaugeColors {
    fn default() -> Self {
        Self {
            dial: egui::Color32::from_rgb(70, 76, 88),
            tick: egui::Color32::from_rgb(190, 196, 208),
            needle: egui::Color32::from_rgb(232, 76, 61),
            hub: egui::Color32::from_rgb(220, 220, 220),
            label: egui::Color32::from_rgb(200, 204, 214),
        }
    }
}

/// Screen-space point at `radius` from `center` for a clockwise-from-up rotation.
pub fn point_at(center: egui::Pos2, radius: f32, rotation_degrees: f32) -> egui::Pos2 {
    let radians = rotation_degrees.to_radians();
    egui::pos2(
        center.x + radius * radians.sin(),
        center.y - radius * radians.cos(),
    )
}

pub fn show_gauge(ui: &mut egui::Ui, needle_degrees: f64, angle: f64, colors: GaugeColors) {
    let size = egui::vec2(ui.available_width().min(360.0), 210.0);
    let (response, painter) = ui.allocate_painter(size, egui::Sense::hover());
    let rect = response.rect;
    let center = egui::pos2(rect.center().x, rect.bottom() - 24.0);
    let radius = (rect.width() / 2.0 - 16.0).min(rect.height() - 40.0);

    let arc: Vec<egui::Pos2> = (0..=DIAL_SEGMENTS)
        .map(|i| {
            let rotation = -90.0 + 180.0 * i as f32 / DIAL_SEGMENTS as f32;
            point_at(center, radius, rotation)
        })
        .collect();
    painter.add(egui::Shape::line(arc, egui::Stroke::new(10.0, colors.dial)));

    for i in 0..=MAJOR_TICKS {
        let fraction = i as f32 / MAJOR_TICKS as f32;
        let rotation = -90.0 + 180.0 * fraction;
        painter.line_segment(
            [
                point_at(center, radius - 14.0, rotation),
                point_at(center, radius + 4.0, rotation),
            ],
            egui::Stroke::new(2.0, colors.tick),
        );
        let value = MAX_SENSOR_ANGLE as f32 * fraction;
        painter.text(
            point_at(center, radius - 30.0, rotation),
            egui::Align2::CENTER_CENTER,
            format!("{value:.0}"),
            egui::FontId::proportional(13.0),
            colors.label,
        );
    }

    let tip = point_at(center, radius - 8.0, needle_degrees as f32);
    painter.line_segment([center, tip], egui::Stroke::new(4.0, colors.needle));
    painter.circle_filled(center, 8.0, colors.hub);
    painter.text(
        egui::pos2(center.x, rect.bottom() - 4.0),
        egui::Align2::CENTER_BOTTOM,
        format!("{angle:.1}°"),
        egui::FontId::proportional(15.0),
        colors.label,
    );
}

#[cfg(test)]
mod tests {
    use super::point_at;
    use eframe::egui;

    #[test]
    fn zero_rotation_points_up_and_quarter_turns_point_sideways() {
        let center = egui::pos2(100.0, 100.0);
        let up = point_at(center, 10.0, 0.0);
        assert!((up.x - 100.0).abs() < 1e-4 && (up.y - 90.0).abs() < 1e-4);

        let right = point_at(center, 10.0, 90.0);
        assert!((right.x - 110.0).abs() < 1e-4 && (right.y - 100.0).abs() < 1e-4);

        let left = point_at(center, 10.0, -90.0);
        assert!((left.x - 90.0).abs() < 1e-4 && (left.y - 100.0).abs() < 1e-4);
    }
}
