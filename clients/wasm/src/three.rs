//! `JsRenderEngine`: forwards [`RenderEngine`] calls to a JS adapter
//! object, normally a thin wrapper over three.js.
//!
//! ## Adapter interface
//!
//! ```js
//! const adapter = {
//!   createGroup(parent)               { /* new THREE.Group(), add to parent or scene */ },
//!   addMesh(parent, kind, params)     { /* kind: mast | boom | tip | ring | label */ },
//!   setPosition(node, x, y, z)        { node.position.set(x, y, z); },
//!   setRotation(node, x, y, z, order) { node.rotation.set(x, y, z, order); },
//!   setScale(node, x, y, z)           { node.scale.set(x, y, z); },
//!   setColor(node, hex)               { node.material.color.setHex(hex); },
//!   addDashedLine(fx, fy, fz, tx, ty, tz, hex) { /* LineDashedMaterial */ },
//!   remove(node)                      { node.removeFromParent(); /* dispose */ },
//! };
//! ```
//!
//! Handles are whatever the adapter returns. The adapter owns the scene
//! graph and the render loop; this side never reads it back.

use crane_console::scene::{MeshSpec, RenderEngine};
use crane_console::types::{Euler, Rgb, Vec3};
use js_sys::{Array, Function, Object, Reflect};
use wasm_bindgen::{JsCast, JsValue};

use crate::bridge::js_error;

pub struct JsRenderEngine {
    adapter: JsValue,
}

impl JsRenderEngine {
    pub fn new(adapter: JsValue) -> Self {
        Self { adapter }
    }

    fn call(&self, method: &str, args: &[JsValue]) -> JsValue {
        let func = match Reflect::get(&self.adapter, &JsValue::from_str(method))
            .ok()
            .and_then(|f| f.dyn_into::<Function>().ok())
        {
            Some(func) => func,
            None => {
                log::error!("[three] Adapter has no method '{}'", method);
                return JsValue::NULL;
            }
        };
        let arr = Array::new();
        for a in args {
            arr.push(a);
        }
        match func.apply(&self.adapter, &arr) {
            Ok(v) => v,
            Err(e) => {
                log::warn!("[three] {} failed: {}", method, js_error(&e));
                JsValue::NULL
            }
        }
    }

    fn node_xyz(&self, method: &str, node: &JsValue, v: Vec3) {
        self.call(
            method,
            &[
                node.clone(),
                JsValue::from(v.x),
                JsValue::from(v.y),
                JsValue::from(v.z),
            ],
        );
    }
}

/// `(kind, params)` for a mesh.
pub fn mesh_args(mesh: &MeshSpec) -> (&'static str, Vec<(&'static str, JsValue)>) {
    match mesh {
        MeshSpec::Mast { height } => ("mast", vec![("height", JsValue::from(*height))]),
        MeshSpec::Boom { length } => ("boom", vec![("length", JsValue::from(*length))]),
        MeshSpec::TipMarker { radius } => ("tip", vec![("radius", JsValue::from(*radius))]),
        MeshSpec::RadiusRing => ("ring", vec![]),
        MeshSpec::Label { text } => ("label", vec![("text", JsValue::from_str(text))]),
    }
}

impl RenderEngine for JsRenderEngine {
    type Handle = JsValue;

    fn create_group(&mut self, parent: Option<&JsValue>) -> JsValue {
        self.call("createGroup", &[parent.cloned().unwrap_or(JsValue::NULL)])
    }

    fn add_mesh(&mut self, parent: &JsValue, mesh: MeshSpec) -> JsValue {
        let (kind, params) = mesh_args(&mesh);
        let obj = Object::new();
        for (key, value) in params {
            let _ = Reflect::set(&obj, &JsValue::from_str(key), &value);
        }
        self.call("addMesh", &[parent.clone(), JsValue::from_str(kind), obj.into()])
    }

    fn set_position(&mut self, node: &JsValue, position: Vec3) {
        self.node_xyz("setPosition", node, position);
    }

    fn set_rotation(&mut self, node: &JsValue, rotation: Euler) {
        self.call(
            "setRotation",
            &[
                node.clone(),
                JsValue::from(rotation.x),
                JsValue::from(rotation.y),
                JsValue::from(rotation.z),
                JsValue::from_str("YXZ"),
            ],
        );
    }

    fn set_scale(&mut self, node: &JsValue, scale: Vec3) {
        self.node_xyz("setScale", node, scale);
    }

    fn set_color(&mut self, node: &JsValue, color: Rgb) {
        self.call("setColor", &[node.clone(), JsValue::from(color.0)]);
    }

    fn add_dashed_line(&mut self, from: Vec3, to: Vec3, color: Rgb) -> JsValue {
        self.call(
            "addDashedLine",
            &[
                JsValue::from(from.x),
                JsValue::from(from.y),
                JsValue::from(from.z),
                JsValue::from(to.x),
                JsValue::from(to.y),
                JsValue::from(to.z),
                JsValue::from(color.0),
            ],
        )
    }

    fn remove(&mut self, node: JsValue) {
        self.call("remove", &[node]);
    }
}

#[cfg(all(test, target_arch = "wasm32"))]
mod tests {
    use super::*;
    use wasm_bindgen_test::wasm_bindgen_test;

    #[wasm_bindgen_test]
    fn mesh_kinds_match_adapter_names() {
        let (kind, params) = mesh_args(&MeshSpec::Boom { length: 40.0 });
        assert_eq!(kind, "boom");
        assert_eq!(params[0].0, "length");
        assert_eq!(params[0].1.as_f64(), Some(40.0));

        let (kind, params) = mesh_args(&MeshSpec::RadiusRing);
        assert_eq!(kind, "ring");
        assert!(params.is_empty());
    }
}
