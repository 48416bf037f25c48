//! Property bag assembly shared by the feature builders.

use feeder_map_feature_models::{
    COLOR_PROPERTY, FEEDER_ID_PROPERTY, FeatureProperties, UNIQUE_ID_PROPERTY, feeder_color,
};
use feeder_map_network_models::{Description, FeederId};
use serde_json::Value;

/// Copies `description` and stamps the keys every feature carries.
///
/// Computed keys win over description keys of the same name.
pub fn feature_properties(
    description: Option<&Description>,
    feeder_id: FeederId,
    unique_id: String,
) -> FeatureProperties {
    let mut properties = description.cloned().unwrap_or_default();
    properties.insert(FEEDER_ID_PROPERTY.to_string(), Value::from(feeder_id));
    properties.insert(
        COLOR_PROPERTY.to_string(),
        Value::from(feeder_color(feeder_id)),
    );
    properties.insert(UNIQUE_ID_PROPERTY.to_string(), Value::String(unique_id));
    properties
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn computed_keys_override_description() {
        let description = json!({ "feederId": "7", "color": "red", "kva": 75 })
            .as_object()
            .cloned()
            .unwrap();

        let properties = feature_properties(Some(&description), 7, "point-7-0".to_string());

        assert_eq!(properties["feederId"], json!(7));
        assert_eq!(properties["color"], json!("#9FEE6B"));
        assert_eq!(properties["uniqueFeatureId"], json!("point-7-0"));
        assert_eq!(properties["kva"], json!(75));
    }
}
