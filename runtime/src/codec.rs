//! XML encoding of network definitions.
//!
//! Produces and parses the host's `<network>` document. Elements the host
//! reports but virtnet does not model (mac, port ranges, leases) are
//! skipped on decode.

use serde::Serialize;
use virtnet_core::error::{NetError, Result};
use virtnet_core::NetworkDefinition;

/// Serialize a definition to indented XML.
pub fn encode(def: &NetworkDefinition) -> Result<String> {
    let mut buffer = String::new();
    let mut ser = quick_xml::se::Serializer::new(&mut buffer);
    ser.indent(' ', 2);
    def.serialize(ser).map_err(|e| {
        NetError::SerializationError(format!("failed to encode network '{}': {}", def.name, e))
    })?;
    Ok(buffer)
}

/// Parse a definition from XML.
pub fn decode(xml: &str) -> Result<NetworkDefinition> {
    quick_xml::de::from_str(xml)
        .map_err(|e| NetError::SerializationError(format!("failed to decode network XML: {}", e)))
}
