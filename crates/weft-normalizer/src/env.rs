use serde_json::Value;
use weft_config::EnvMap;

/// Merge environment layers ordered outer-to-inner (e.g. workflow, task,
/// agent). A key set by an inner layer overrides the same key from any
/// outer layer.
pub fn merge_env<'a, I>(layers: I) -> EnvMap
where
  I: IntoIterator<Item = &'a EnvMap>,
{
  let mut merged = EnvMap::new();
  for layer in layers {
    merged.extend(layer.iter().map(|(k, v)| (k.clone(), v.clone())));
  }
  merged
}

/// The environment as a template context value.
pub fn env_to_value(env: &EnvMap) -> Value {
  Value::Object(
    env
      .iter()
      .map(|(k, v)| (k.clone(), Value::String(v.clone())))
      .collect(),
  )
}
