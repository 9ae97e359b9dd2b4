use crate::config::AppConfig;
use crate::types::Province;
use anyhow::{anyhow, Context, Result};
use geo::{Area, MultiPolygon, Polygon};
use std::fs::File;
use tracing::info;

/// Attribute names tried, in order, for the ISO 3166-2 subdivision code.
/// Natural Earth admin-1 layers differ between releases.
const ISO_FIELD_CANDIDATES: &[&str] = &["iso_3166_2", "iso", "adm1_code", "code_hasc"];

/// Load province polygons from the configured geometry file.
///
/// Supports shapefiles and GeoJSON FeatureCollections. The input is assumed
/// to already be in a planar area-preserving projection; reprojection happens
/// upstream. Identifiers assigned here are provisional load positions, the
/// consolidation pass compacts them.
pub fn load_provinces(config: &AppConfig) -> Result<Vec<Province>> {
    let extension = config
        .input
        .geometry
        .extension()
        .and_then(|e| e.to_str())
        .map(|s: &str| s.to_lowercase())
        .ok_or_else(|| anyhow!("Input geometry file has no extension"))?;

    let provinces = match extension.as_str() {
        "shp" => load_shapefile(config)?,
        "json" | "geojson" => load_geojson(config)?,
        _ => return Err(anyhow!("Unsupported geometry format: {}", extension)),
    };

    info!("Loaded {} province polygons", provinces.len());
    Ok(provinces)
}

fn keep_country(config: &AppConfig, code: &str) -> bool {
    config.input.countries.is_empty() || config.input.countries.iter().any(|c| c == code)
}

/// Interior rings are cartographic noise for this pipeline and distort the
/// area floor check (a province ringed by enclaves can report near-zero
/// area), so every polygon is reduced to its exterior shell.
fn remove_holes(geometry: &MultiPolygon<f64>) -> MultiPolygon<f64> {
    MultiPolygon::new(
        geometry
            .0
            .iter()
            .map(|p| Polygon::new(p.exterior().clone(), vec![]))
            .collect(),
    )
}

fn make_province(
    position: usize,
    country_code: String,
    country_name: String,
    name: String,
    name_alt: Option<String>,
    iso_code: Option<String>,
    geometry: MultiPolygon<f64>,
) -> Province {
    let geometry = remove_holes(&geometry);
    let area = geometry.unsigned_area();
    Province {
        id: position,
        country_code,
        country_name,
        name,
        name_alt,
        iso_code,
        area,
        geometry,
    }
}

fn load_shapefile(config: &AppConfig) -> Result<Vec<Province>> {
    let mut reader = shapefile::Reader::from_path(&config.input.geometry)
        .with_context(|| format!("Failed to open shapefile: {:?}", config.input.geometry))?;

    let mut provinces = Vec::new();

    for result in reader.iter_shapes_and_records() {
        let (shape, record) = result?;

        let country_code = match dbase_string(&record, "adm0_a3") {
            Some(code) => code,
            None => continue,
        };
        if !keep_country(config, &country_code) {
            continue;
        }

        let geometry: MultiPolygon<f64> = match shape {
            shapefile::Shape::Polygon(polygon) => polygon
                .try_into()
                .map_err(|e| anyhow!("Failed to convert polygon: {:?}", e))?,
            shapefile::Shape::PolygonM(polygon) => polygon
                .try_into()
                .map_err(|e| anyhow!("Failed to convert polygonM: {:?}", e))?,
            shapefile::Shape::PolygonZ(polygon) => polygon
                .try_into()
                .map_err(|e| anyhow!("Failed to convert polygonZ: {:?}", e))?,
            _ => continue, // Skip non-polygon shapes
        };

        let country_name = dbase_string(&record, "admin").unwrap_or_default();
        let name = dbase_string(&record, "name_en")
            .or_else(|| dbase_string(&record, "name"))
            .unwrap_or_default();
        let name_alt = dbase_string(&record, "name_alt");
        let iso_code = ISO_FIELD_CANDIDATES
            .iter()
            .find_map(|field| dbase_string(&record, field));

        provinces.push(make_province(
            provinces.len(),
            country_code,
            country_name,
            name,
            name_alt,
            iso_code,
            geometry,
        ));
    }

    Ok(provinces)
}

fn dbase_string(record: &shapefile::dbase::Record, field: &str) -> Option<String> {
    match record.get(field) {
        Some(shapefile::dbase::FieldValue::Character(Some(s))) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                None
            } else {
                Some(trimmed.to_string())
            }
        }
        _ => None,
    }
}

fn load_geojson(config: &AppConfig) -> Result<Vec<Province>> {
    use geojson::GeoJson;
    use std::io::BufReader;

    let file = File::open(&config.input.geometry)
        .with_context(|| format!("Failed to open GeoJSON file: {:?}", config.input.geometry))?;
    let reader = BufReader::new(file);
    let geojson = GeoJson::from_reader(reader).context("Failed to parse GeoJSON")?;

    let collection = match geojson {
        GeoJson::FeatureCollection(fc) => fc,
        _ => return Err(anyhow!("GeoJSON must be a FeatureCollection")),
    };

    let mut provinces = Vec::new();

    for feature in collection.features {
        let props = match feature.properties.as_ref() {
            Some(props) => props,
            None => continue,
        };

        let country_code = match prop_string(props, "adm0_a3") {
            Some(code) => code,
            None => continue,
        };
        if !keep_country(config, &country_code) {
            continue;
        }

        let geometry = match feature.geometry {
            Some(geom) => {
                let converted: geo::Geometry<f64> = geom
                    .value
                    .try_into()
                    .map_err(|e| anyhow!("Failed to convert geojson geometry: {:?}", e))?;
                match converted {
                    geo::Geometry::MultiPolygon(mp) => mp,
                    geo::Geometry::Polygon(p) => MultiPolygon::new(vec![p]),
                    _ => continue, // Skip points/lines
                }
            }
            None => continue,
        };

        let country_name = prop_string(props, "admin").unwrap_or_default();
        let name = prop_string(props, "name_en")
            .or_else(|| prop_string(props, "name"))
            .unwrap_or_default();
        let name_alt = prop_string(props, "name_alt");
        let iso_code = ISO_FIELD_CANDIDATES
            .iter()
            .find_map(|field| prop_string(props, field));

        provinces.push(make_province(
            provinces.len(),
            country_code,
            country_name,
            name,
            name_alt,
            iso_code,
            geometry,
        ));
    }

    Ok(provinces)
}

fn prop_string(props: &serde_json::Map<String, serde_json::Value>, key: &str) -> Option<String> {
    match props.get(key) {
        Some(serde_json::Value::String(s)) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                None
            } else {
                Some(trimmed.to_string())
            }
        }
        Some(serde_json::Value::Number(n)) => Some(n.to_string()),
        _ => None,
    }
}
