use std::sync::LazyLock;

use serde::Serialize;

use crate::error::{FilmError, Result};
use crate::state::{FilmParameters, HexTint, LegacySettings};

#[derive(Debug, Clone, PartialEq, Serialize)]
/// Named, read-only parameter template modelled on a film stock.
pub struct FilmPreset {
    pub id: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub manufacturer: Option<&'static str>,
    /// ISO box speed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub speed: Option<u32>,
    pub params: FilmParameters,
}

struct Seed {
    id: &'static str,
    name: &'static str,
    description: &'static str,
    manufacturer: &'static str,
    speed: u32,
    contrast: f32,
    brightness: f32,
    grain: f32,
    tint: &'static str,
    intensity: f32,
}

// contrast / brightness on the signed slider convention, tint as a hex wash
const SEEDS: &[Seed] = &[
    Seed {
        id: "tri-x-400",
        name: "Kodak Tri-X 400",
        description: "Classic high-contrast film with rich blacks",
        manufacturer: "Kodak",
        speed: 400,
        contrast: 40.0,
        brightness: -15.0,
        grain: 30.0,
        tint: "#FFE8CC",
        intensity: 15.0,
    },
    Seed {
        id: "hp5-plus",
        name: "Ilford HP5+",
        description: "Versatile film with excellent tonal range",
        manufacturer: "Ilford",
        speed: 400,
        contrast: 30.0,
        brightness: -10.0,
        grain: 25.0,
        tint: "#E6E6E6",
        intensity: 10.0,
    },
    Seed {
        id: "tmax-100",
        name: "Kodak T-MAX 100",
        description: "Ultra-fine grain with exceptional detail",
        manufacturer: "Kodak",
        speed: 100,
        contrast: 35.0,
        brightness: -5.0,
        grain: 15.0,
        tint: "#E6F3FF",
        intensity: 12.0,
    },
    Seed {
        id: "delta-3200",
        name: "Ilford Delta 3200",
        description: "High-speed film for low light with dramatic grain",
        manufacturer: "Ilford",
        speed: 3200,
        contrast: 45.0,
        brightness: -20.0,
        grain: 45.0,
        tint: "#D9D9D9",
        intensity: 8.0,
    },
    Seed {
        id: "fp4-plus",
        name: "Ilford FP4+",
        description: "Medium-speed film with smooth gradations",
        manufacturer: "Ilford",
        speed: 125,
        contrast: 25.0,
        brightness: -8.0,
        grain: 15.0,
        tint: "#F2F2F2",
        intensity: 10.0,
    },
    Seed {
        id: "acros-100",
        name: "Fuji Acros 100",
        description: "Sharp with deep blacks and fine grain",
        manufacturer: "Fujifilm",
        speed: 100,
        contrast: 30.0,
        brightness: -5.0,
        grain: 10.0,
        tint: "#E6E6FF",
        intensity: 15.0,
    },
    Seed {
        id: "pan-f-50",
        name: "Ilford Pan F+ 50",
        description: "Ultra-fine grain with extreme sharpness",
        manufacturer: "Ilford",
        speed: 50,
        contrast: 35.0,
        brightness: -3.0,
        grain: 5.0,
        tint: "#F0F0F0",
        intensity: 12.0,
    },
    Seed {
        id: "delta-100",
        name: "Ilford Delta 100",
        description: "Modern emulsion with exceptional detail",
        manufacturer: "Ilford",
        speed: 100,
        contrast: 28.0,
        brightness: -7.0,
        grain: 12.0,
        tint: "#E6E6E6",
        intensity: 10.0,
    },
    Seed {
        id: "rpx-25",
        name: "Rollei RPX 25",
        description: "Ultra-fine grain with high resolution",
        manufacturer: "Rollei",
        speed: 25,
        contrast: 32.0,
        brightness: -5.0,
        grain: 8.0,
        tint: "#F5F5F5",
        intensity: 8.0,
    },
    Seed {
        id: "neopan-100",
        name: "Fuji Neopan 100 Acros II",
        description: "Modern Japanese film with exceptional sharpness",
        manufacturer: "Fujifilm",
        speed: 100,
        contrast: 32.0,
        brightness: -8.0,
        grain: 12.0,
        tint: "#E6FFFF",
        intensity: 15.0,
    },
    Seed {
        id: "kentmere-100",
        name: "Kentmere 100",
        description: "Budget-friendly film with classic tonality",
        manufacturer: "Kentmere",
        speed: 100,
        contrast: 25.0,
        brightness: -5.0,
        grain: 18.0,
        tint: "#F2E6D9",
        intensity: 12.0,
    },
    Seed {
        id: "apx-100",
        name: "Agfa APX 100",
        description: "Fine grain with balanced contrast and rich midtones",
        manufacturer: "Agfa",
        speed: 100,
        contrast: 28.0,
        brightness: -7.0,
        grain: 15.0,
        tint: "#FFE6CC",
        intensity: 18.0,
    },
    Seed {
        id: "delta-400",
        name: "Ilford Delta 400",
        description: "Modern T-grain emulsion with excellent detail",
        manufacturer: "Ilford",
        speed: 400,
        contrast: 35.0,
        brightness: -12.0,
        grain: 25.0,
        tint: "#E6E6E6",
        intensity: 10.0,
    },
    Seed {
        id: "fomapan-100",
        name: "Fomapan 100 Classic",
        description: "Traditional Czech film with vintage character",
        manufacturer: "Foma",
        speed: 100,
        contrast: 30.0,
        brightness: -8.0,
        grain: 20.0,
        tint: "#FFE6B3",
        intensity: 20.0,
    },
    Seed {
        id: "fomapan-400",
        name: "Fomapan 400 Action",
        description: "High-speed film with pronounced grain structure",
        manufacturer: "Foma",
        speed: 400,
        contrast: 35.0,
        brightness: -15.0,
        grain: 30.0,
        tint: "#FFD9B3",
        intensity: 15.0,
    },
];

static CATALOG: LazyLock<Vec<FilmPreset>> = LazyLock::new(|| {
    SEEDS
        .iter()
        .map(|seed| {
            let settings = LegacySettings {
                contrast: seed.contrast,
                brightness: seed.brightness,
                grain: seed.grain,
                tint: Some(HexTint {
                    color: seed.tint.to_string(),
                    intensity: seed.intensity,
                }),
            };
            FilmPreset {
                id: seed.id,
                name: seed.name,
                description: seed.description,
                manufacturer: Some(seed.manufacturer),
                speed: Some(seed.speed),
                params: settings.to_parameters(),
            }
        })
        .collect()
});

/// Every preset, in display order.
pub fn all() -> &'static [FilmPreset] {
    &CATALOG
}

/// Finds a preset by id or display name, ignoring ASCII case.
pub fn lookup(name: &str) -> Result<&'static FilmPreset> {
    let wanted = name.trim();
    all()
        .iter()
        .find(|p| p.id.eq_ignore_ascii_case(wanted) || p.name.eq_ignore_ascii_case(wanted))
        .ok_or_else(|| FilmError::PresetNotFound(name.to_string()))
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn catalog_has_fifteen_stocks_in_order() {
        let presets = all();
        assert_eq!(presets.len(), 15);
        assert_eq!(presets[0].id, "tri-x-400");
        assert_eq!(presets[14].id, "fomapan-400");
    }

    #[test]
    fn ids_and_names_are_unique() {
        let ids: HashSet<_> = all().iter().map(|p| p.id).collect();
        let names: HashSet<_> = all().iter().map(|p| p.name).collect();
        assert_eq!(ids.len(), all().len());
        assert_eq!(names.len(), all().len());
    }

    #[test]
    fn lookup_matches_id_and_name_case_insensitively() {
        assert_eq!(lookup("TRI-X-400").unwrap().name, "Kodak Tri-X 400");
        assert_eq!(lookup("ilford hp5+").unwrap().id, "hp5-plus");
    }

    #[test]
    fn lookup_reports_missing_preset() {
        let err = lookup("Portra 400").unwrap_err();
        assert!(matches!(err, FilmError::PresetNotFound(ref n) if n == "Portra 400"));
    }

    #[test]
    fn tri_x_carries_its_contrast_and_exposure() {
        let p = lookup("tri-x-400").unwrap().params;
        assert_eq!(p.contrast, 40.0);
        assert_eq!(p.exposure, 85.0);
        assert_eq!(p.grain, 30.0);
        assert_eq!(p.blur, 0.0);
    }

    #[test]
    fn every_preset_is_already_in_range() {
        for preset in all() {
            assert_eq!(preset.params.sanitized().unwrap(), preset.params, "{}", preset.id);
        }
    }

    #[test]
    fn presets_serialize_as_plain_records() {
        let json = serde_json::to_value(lookup("acros-100").unwrap()).unwrap();
        assert_eq!(json["manufacturer"], "Fujifilm");
        assert_eq!(json["speed"], 100);
        assert_eq!(json["params"]["contrast"], 30.0);
        assert!(json["params"]["paperTone"].is_object());
    }
}
