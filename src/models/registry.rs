//! Model Endpoint Registry (C3): static model identifier → endpoint
//! shape mapping. Grounded in the `MODEL_KEYS` table of the multi-model
//! Open-Meteo client in the example pack, generalized from a fixed
//! four-model list into the full NWP set named in the glossary.

/// Units an endpoint reports before C4 normalizes them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UpstreamUnits {
    pub wind_speed: &'static str,
    pub precipitation: &'static str,
    pub temperature: &'static str,
    pub daylight_duration: &'static str,
}

pub const OPEN_METEO_UNITS: UpstreamUnits = UpstreamUnits {
    wind_speed: "km/h",
    precipitation: "mm",
    temperature: "celsius",
    daylight_duration: "seconds",
};

/// Registry entry for one model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModelEndpoint {
    pub id: &'static str,
    pub path_template: &'static str,
    /// Whether a `models=<variant>` query parameter must be appended,
    /// because this model is served via the generic forecast path
    /// rather than a dedicated one.
    pub requires_models_param: bool,
    pub variant: &'static str,
    pub units: UpstreamUnits,
}

const GENERIC_FORECAST_PATH: &str = "https://api.open-meteo.com/v1/forecast";

const REGISTRY: &[ModelEndpoint] = &[
    ModelEndpoint {
        id: "ecmwf",
        path_template: GENERIC_FORECAST_PATH,
        requires_models_param: true,
        variant: "ecmwf_ifs025",
        units: OPEN_METEO_UNITS,
    },
    ModelEndpoint {
        id: "gfs",
        path_template: GENERIC_FORECAST_PATH,
        requires_models_param: true,
        variant: "gfs_seamless",
        units: OPEN_METEO_UNITS,
    },
    ModelEndpoint {
        id: "icon",
        path_template: GENERIC_FORECAST_PATH,
        requires_models_param: true,
        variant: "icon_seamless",
        units: OPEN_METEO_UNITS,
    },
    ModelEndpoint {
        id: "arpege",
        path_template: GENERIC_FORECAST_PATH,
        requires_models_param: true,
        variant: "meteofrance_arpege_world",
        units: OPEN_METEO_UNITS,
    },
    ModelEndpoint {
        id: "ukmo",
        path_template: GENERIC_FORECAST_PATH,
        requires_models_param: true,
        variant: "ukmo_seamless",
        units: OPEN_METEO_UNITS,
    },
    ModelEndpoint {
        id: "gem",
        path_template: GENERIC_FORECAST_PATH,
        requires_models_param: true,
        variant: "gem_seamless",
        units: OPEN_METEO_UNITS,
    },
    ModelEndpoint {
        id: "jma",
        path_template: GENERIC_FORECAST_PATH,
        requires_models_param: true,
        variant: "jma_seamless",
        units: OPEN_METEO_UNITS,
    },
];

/// Every model identifier this build knows how to fetch.
pub fn known_model_ids() -> Vec<&'static str> {
    REGISTRY.iter().map(|e| e.id).collect()
}

pub fn lookup(model_id: &str) -> Option<&'static ModelEndpoint> {
    REGISTRY.iter().find(|e| e.id == model_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_glossary_model_is_registered() {
        for id in ["ecmwf", "gfs", "icon", "arpege", "ukmo", "gem", "jma"] {
            assert!(lookup(id).is_some(), "missing {id}");
        }
    }

    #[test]
    fn unknown_model_returns_none() {
        assert!(lookup("not-a-model").is_none());
    }

    #[test]
    fn known_model_ids_matches_registry_len() {
        assert_eq!(known_model_ids().len(), REGISTRY.len());
    }
}
