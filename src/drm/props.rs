//! KMS property lookup

use anyhow::{bail, Result};
use drm::control::{connector, property, Device as ControlDevice, ResourceHandle};
use log::debug;

use crate::constants::PANEL_ORIENTATION_PROP;
use crate::rotation::PanelOrientation;

/// Type and raw value of the property called `name`
pub fn get_property_val(
    device: &impl ControlDevice,
    handle: impl ResourceHandle,
    name: &str,
) -> Result<Option<(property::ValueType, property::RawValue)>> {
    let props = device.get_properties(handle)?;
    let (prop_handles, values) = props.as_props_and_values();
    for (&prop, &val) in prop_handles.iter().zip(values.iter()) {
        let info = device.get_property(prop)?;
        if Some(name) == info.name().to_str().ok() {
            return Ok(Some((info.value_type(), val)));
        }
    }
    Ok(None)
}

/// Panel orientation of a connector, `None` if it has no such property
pub fn panel_orientation(
    device: &impl ControlDevice,
    connector: connector::Handle,
) -> Result<Option<PanelOrientation>> {
    let Some((val_type, val)) = get_property_val(device, connector, PANEL_ORIENTATION_PROP)? else {
        debug!("Connector {:?} has no panel orientation", connector);
        return Ok(None);
    };

    match val_type.convert_value(val) {
        property::Value::Enum(Some(entry)) => {
            let name = entry.name().to_string_lossy();
            match PanelOrientation::from_name(&name) {
                Some(orientation) => Ok(Some(orientation)),
                None => bail!("unknown panel orientation '{}'", name),
            }
        }
        other => bail!("unexpected panel orientation value {:?}", other),
    }
}
