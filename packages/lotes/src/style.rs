//! Colours and marker shapes handed to the map renderer.
//!
//! Lots are coloured from a 20-slot palette by `id mod 20`; the unassigned
//! lot is always grey. Units get colours from a fixed 36-colour palette,
//! extended with golden-ratio hues when there are more units than that.
//! Datasets are told apart by marker shape.

use std::collections::BTreeMap;

use lotes_models::{
    ClusterId, DatasetInfo, MarkerShape, PointRecord, PointStyle, UNASSIGNED_CLUSTER,
};

use crate::{DatasetRegistry, RecordStore, SessionError};

/// Colour of the unassigned lot.
pub const UNASSIGNED_COLOR: &str = "#999999";

const CLUSTER_COLORS: [&str; 20] = [
    "#e41a1c", "#377eb8", "#4daf4a", "#984ea3", "#ff7f00", "#ffff33", "#a65628", "#f781bf",
    "#999999", "#8dd3c7", "#bebada", "#fb8072", "#80b1d3", "#fdb462", "#b3de69", "#fccde5",
    "#d9d9d9", "#bc80bd", "#ccebc5", "#ffed6f",
];

const UNIT_COLORS: [&str; 36] = [
    "#FF0000", "#0000FF", "#00FF00", "#FFFF00", "#FF00FF", "#00FFFF", "#8B0000", "#00008B",
    "#006400", "#B8860B", "#8B008B", "#008B8B", "#FF6347", "#4169E1", "#32CD32", "#FFD700",
    "#FF1493", "#00CED1", "#FF4500", "#FF8C00", "#D2691E", "#A0522D", "#8B4513", "#CD853F",
    "#9400D3", "#9932CC", "#BA55D3", "#DA70D6", "#EE82EE", "#FF69B4", "#228B22", "#2E8B57",
    "#3CB371", "#66CDAA", "#7FFF00", "#ADFF2F",
];

const GOLDEN_RATIO_CONJUGATE: f64 = 0.618_033_988_749_895;

/// Per-session lot colours. Recolouring a lot replaces its palette slot,
/// so every lot sharing the slot changes with it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClusterPalette {
    colors: Vec<String>,
}

impl Default for ClusterPalette {
    fn default() -> Self {
        Self {
            colors: CLUSTER_COLORS.iter().map(ToString::to_string).collect(),
        }
    }
}

impl ClusterPalette {
    fn slot(&self, cluster: ClusterId) -> usize {
        let len = ClusterId::try_from(self.colors.len()).unwrap_or(ClusterId::MAX);
        usize::try_from(cluster.rem_euclid(len)).unwrap_or_default()
    }

    #[must_use]
    pub fn color_for(&self, cluster: ClusterId) -> &str {
        if cluster == UNASSIGNED_CLUSTER {
            return UNASSIGNED_COLOR;
        }
        &self.colors[self.slot(cluster)]
    }

    /// Replaces the colour of the lot's palette slot.
    ///
    /// # Errors
    ///
    /// * [`SessionError::UnassignedColor`] for the unassigned lot
    /// * [`SessionError::InvalidColor`] if `color` is not `#rrggbb`
    pub fn recolor(&mut self, cluster: ClusterId, color: &str) -> Result<(), SessionError> {
        if cluster == UNASSIGNED_CLUSTER {
            return Err(SessionError::UnassignedColor);
        }
        if !is_hex_color(color) {
            return Err(SessionError::InvalidColor {
                value: color.to_string(),
            });
        }

        let slot = self.slot(cluster);
        self.colors[slot] = color.to_ascii_lowercase();
        log::info!("Lot {cluster} recoloured to {color} (palette slot {slot})");
        Ok(())
    }

    /// Restores the default colours.
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Whether `value` is a `#rrggbb` colour.
#[must_use]
pub fn is_hex_color(value: &str) -> bool {
    value
        .strip_prefix('#')
        .is_some_and(|hex| hex.len() == 6 && hex.chars().all(|c| c.is_ascii_hexdigit()))
}

/// Converts HSL (hue in degrees, saturation and lightness in percent) to
/// `#rrggbb`.
#[must_use]
pub fn hsl_to_hex(hue: f64, saturation: f64, lightness: f64) -> String {
    let l = lightness / 100.0;
    let a = saturation * l.min(1.0 - l) / 100.0;
    let channel = |n: f64| {
        let k = (n + hue / 30.0) % 12.0;
        let c = a.mul_add(-(k - 3.0).min(9.0 - k).clamp(-1.0, 1.0), l);
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let byte = (255.0 * c).round().clamp(0.0, 255.0) as u8;
        byte
    };
    format!("#{:02x}{:02x}{:02x}", channel(0.0), channel(8.0), channel(4.0))
}

/// Colour of the `n`-th unit past the base palette.
#[must_use]
pub fn generated_unit_color(n: usize) -> String {
    #[allow(clippy::cast_precision_loss)]
    let hue = ((n + 1) as f64 * GOLDEN_RATIO_CONJUGATE).fract() * 360.0;
    let saturation = if n % 2 == 0 { 85.0 } else { 65.0 };
    let lightness = match n % 3 {
        0 => 40.0,
        1 => 60.0,
        _ => 50.0,
    };
    hsl_to_hex(hue, saturation, lightness)
}

/// Unit name → colour, assigned in unit name order.
#[must_use]
pub fn unit_colors(store: &RecordStore) -> BTreeMap<String, String> {
    store
        .unit_index()
        .keys()
        .enumerate()
        .map(|(i, unit)| {
            let color = UNIT_COLORS.get(i).map_or_else(
                || generated_unit_color(i - UNIT_COLORS.len()),
                ToString::to_string,
            );
            (unit.clone(), color)
        })
        .collect()
}

/// Rendering attributes of one point.
#[must_use]
pub fn point_style(
    point: &PointRecord,
    palette: &ClusterPalette,
    unit_colors: &BTreeMap<String, String>,
) -> PointStyle {
    PointStyle {
        cluster_color: palette.color_for(point.cluster).to_string(),
        unit_color: unit_colors
            .get(&point.unidade_local)
            .cloned()
            .unwrap_or_else(|| UNASSIGNED_COLOR.to_string()),
        shape: MarkerShape::for_dataset(point.dataset),
    }
}

/// Legend entries for every registered dataset.
#[must_use]
pub fn dataset_infos(store: &RecordStore, datasets: &DatasetRegistry) -> Vec<DatasetInfo> {
    datasets
        .datasets()
        .map(|(dataset, filename)| DatasetInfo {
            dataset,
            filename: filename.map(ToString::to_string),
            label: datasets.label(dataset),
            shape: MarkerShape::for_dataset(dataset),
            points: store
                .points()
                .iter()
                .filter(|p| p.dataset == dataset)
                .count(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{point, store_of};

    #[test]
    fn palette_cycles_and_greys_out_unassigned() {
        let palette = ClusterPalette::default();
        assert_eq!(palette.color_for(0), "#e41a1c");
        assert_eq!(palette.color_for(21), "#377eb8");
        assert_eq!(palette.color_for(1001), "#377eb8");
        assert_eq!(palette.color_for(UNASSIGNED_CLUSTER), UNASSIGNED_COLOR);
    }

    #[test]
    fn recolor_replaces_slot() {
        let mut palette = ClusterPalette::default();
        palette.recolor(3, "#00AA11").unwrap();
        assert_eq!(palette.color_for(3), "#00aa11");
        assert_eq!(palette.color_for(23), "#00aa11");

        palette.reset();
        assert_eq!(palette.color_for(3), "#984ea3");
    }

    #[test]
    fn recolor_validates_input() {
        let mut palette = ClusterPalette::default();
        assert!(matches!(
            palette.recolor(UNASSIGNED_CLUSTER, "#000000"),
            Err(SessionError::UnassignedColor)
        ));
        for bad in ["red", "#12345", "#12345g", "123456"] {
            assert!(matches!(
                palette.recolor(1, bad),
                Err(SessionError::InvalidColor { .. })
            ));
        }
        assert_eq!(palette, ClusterPalette::default());
    }

    #[test]
    fn hsl_conversion() {
        assert_eq!(hsl_to_hex(0.0, 100.0, 50.0), "#ff0000");
        assert_eq!(hsl_to_hex(120.0, 100.0, 50.0), "#00ff00");
        assert_eq!(hsl_to_hex(240.0, 100.0, 25.0), "#000080");
        assert_eq!(hsl_to_hex(0.0, 0.0, 100.0), "#ffffff");
    }

    #[test]
    fn unit_colors_extend_past_base_palette() {
        let points = (0..40)
            .map(|i| point(&format!("p{i}"), 0, &format!("UL-{i:02}")))
            .collect();
        let colors = unit_colors(&store_of(points));

        assert_eq!(colors.len(), 40);
        assert_eq!(colors["UL-00"], "#FF0000");
        assert_eq!(colors["UL-35"], "#ADFF2F");
        assert_eq!(colors["UL-36"], generated_unit_color(0));
        assert!(colors.values().all(|c| c.len() == 7 && c.starts_with('#')));
        assert_ne!(generated_unit_color(0), generated_unit_color(1));
    }

    #[test]
    fn styles_follow_cluster_unit_and_dataset() {
        let mut overlay = point("sobreposicao_2_a", 1005, "UL-B");
        overlay.dataset = 2;
        let store = store_of(vec![point("p1", -1, "UL-A"), overlay]);
        let colors = unit_colors(&store);
        let palette = ClusterPalette::default();

        let style = point_style(&store.points()[0], &palette, &colors);
        assert_eq!(style.cluster_color, UNASSIGNED_COLOR);
        assert_eq!(style.unit_color, "#FF0000");
        assert_eq!(style.shape, MarkerShape::Circle);

        let style = point_style(&store.points()[1], &palette, &colors);
        assert_eq!(style.unit_color, "#0000FF");
        assert_eq!(style.shape, MarkerShape::Triangle);
    }

    #[test]
    fn dataset_infos_count_points() {
        let mut registry = DatasetRegistry::new();
        registry.register_primary(Some("base.zip".to_string()));
        registry.register_overlay(None);
        let mut overlay = point("sobreposicao_1_a", 1000, "UL-B");
        overlay.dataset = 1;
        let store = store_of(vec![point("p1", 0, "UL-A"), point("p2", 0, "UL-A"), overlay]);

        let infos = dataset_infos(&store, &registry);
        assert_eq!(infos.len(), 2);
        assert_eq!(infos[0].label, "base.zip");
        assert_eq!(infos[0].points, 2);
        assert_eq!(infos[1].label, "Sobreposto 1");
        assert_eq!(infos[1].shape, MarkerShape::Square);
        assert_eq!(infos[1].points, 1);
    }
}
