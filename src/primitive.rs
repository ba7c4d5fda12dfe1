//! Renderer-native points primitive.
//!
//! `PointsPrimitive` owns the typed buffers filled by one emission pass.
//! Handing it to a `RendererSink` declares every user attribute first and then
//! writes values, so the renderer always knows an attribute's type before it
//! receives data for it.

use glam::Vec3;
use serde::Serialize;

use crate::config::RenderMode;
use crate::resolver::{COLOR_OUTPUT, INCANDESCENCE_OUTPUT, OPACITY_OUTPUT};

/// Whether a declared attribute varies per point or is shared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Scope {
    Constant,
    Uniform,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueType {
    Float,
    Rgb,
    Vector,
}

/// A user attribute declaration on the primitive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Declaration {
    pub name: String,
    pub scope: Scope,
    pub value_type: ValueType,
}

impl Declaration {
    pub fn uniform(name: &str, value_type: ValueType) -> Self {
        Self {
            name: name.to_string(),
            scope: Scope::Uniform,
            value_type,
        }
    }

    pub fn constant(name: &str, value_type: ValueType) -> Self {
        Self {
            name: name.to_string(),
            scope: Scope::Constant,
            value_type,
        }
    }
}

/// A single shared value written to the primitive.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConstantValue {
    Int(i32),
    Bool(bool),
    Float(f32),
    Rgb([f32; 3]),
}

/// An array written to the primitive.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ArrayValue {
    /// Positions laid out key-major: all points of step 0, then step 1, ...
    Points { keys: usize, values: Vec<Vec3> },
    Float(Vec<f32>),
    Rgb(Vec<[f32; 3]>),
    Vector(Vec<Vec3>),
}

impl ArrayValue {
    pub fn len(&self) -> usize {
        match self {
            ArrayValue::Points { values, .. } => values.len(),
            ArrayValue::Float(values) => values.len(),
            ArrayValue::Rgb(values) => values.len(),
            ArrayValue::Vector(values) => values.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Renderer attribute API, consumed as a sink.
pub trait RendererSink {
    fn declare(&mut self, declaration: &Declaration);
    fn set_constant(&mut self, name: &str, value: ConstantValue);
    fn set_array(&mut self, name: &str, array: ArrayValue);
}

/// Values of one role: shared by every point, or one per point.
#[derive(Debug, Clone, PartialEq)]
pub enum AttributeValues<T> {
    Constant(T),
    PerPoint(Vec<T>),
}

impl<T: Copy> AttributeValues<T> {
    /// Value seen by point `index`.
    pub fn get(&self, index: usize) -> Option<T> {
        match self {
            AttributeValues::Constant(value) => Some(*value),
            AttributeValues::PerPoint(values) => values.get(index).copied(),
        }
    }

    pub fn is_per_point(&self) -> bool {
        matches!(self, AttributeValues::PerPoint(_))
    }

    /// Number of stored values (1 for a constant).
    pub fn len(&self) -> usize {
        match self {
            AttributeValues::Constant(_) => 1,
            AttributeValues::PerPoint(values) => values.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Per-point values of an exported extra attribute.
#[derive(Debug, Clone, PartialEq)]
pub enum ExtraValues {
    Float(Vec<f32>),
    Vector(Vec<Vec3>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExtraArray {
    pub name: String,
    pub values: ExtraValues,
}

/// Finished output of one emission pass.
#[derive(Debug, Clone, PartialEq)]
pub struct PointsPrimitive {
    pub point_count: usize,
    /// Motion keys per point; always at least 1.
    pub motion_steps: usize,
    /// `motion_steps * point_count` positions, key-major.
    pub positions: Vec<Vec3>,
    pub radius: AttributeValues<f32>,
    pub color: AttributeValues<[f32; 3]>,
    pub incandescence: AttributeValues<[f32; 3]>,
    pub opacity: AttributeValues<f32>,
    pub extras: Vec<ExtraArray>,
    pub mode: RenderMode,
    pub step_size: Option<f32>,
}

impl PointsPrimitive {
    /// A primitive with no points, produced whenever emission cannot proceed.
    pub fn empty(mode: RenderMode) -> Self {
        Self {
            point_count: 0,
            motion_steps: 1,
            positions: Vec::new(),
            radius: AttributeValues::PerPoint(Vec::new()),
            color: AttributeValues::PerPoint(Vec::new()),
            incandescence: AttributeValues::PerPoint(Vec::new()),
            opacity: AttributeValues::PerPoint(Vec::new()),
            extras: Vec::new(),
            mode,
            step_size: None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.point_count == 0
    }

    /// Position of point `index` at motion key `step`.
    pub fn position(&self, step: usize, index: usize) -> Option<Vec3> {
        if step >= self.motion_steps || index >= self.point_count {
            return None;
        }
        self.positions.get(step * self.point_count + index).copied()
    }

    /// Extra attribute array by name.
    pub fn extra(&self, name: &str) -> Option<&ExtraArray> {
        self.extras.iter().find(|extra| extra.name == name)
    }

    /// User attribute declarations implied by the buffers.
    pub fn declarations(&self) -> Vec<Declaration> {
        let mut declarations = vec![
            role_declaration(COLOR_OUTPUT, self.color.is_per_point(), ValueType::Rgb),
            role_declaration(
                INCANDESCENCE_OUTPUT,
                self.incandescence.is_per_point(),
                ValueType::Rgb,
            ),
            role_declaration(OPACITY_OUTPUT, self.opacity.is_per_point(), ValueType::Float),
        ];
        declarations.extend(self.extras.iter().map(|extra| {
            let value_type = match extra.values {
                ExtraValues::Float(_) => ValueType::Float,
                ExtraValues::Vector(_) => ValueType::Vector,
            };
            Declaration::uniform(&extra.name, value_type)
        }));
        declarations
    }

    /// Transfer the buffers to the renderer.
    ///
    /// An empty primitive writes nothing, leaving a bare points node.
    pub fn submit<R: RendererSink + ?Sized>(self, sink: &mut R) {
        if self.is_empty() {
            return;
        }

        for declaration in self.declarations() {
            sink.declare(&declaration);
            if declaration.scope == Scope::Constant {
                if let Some(value) = self.constant_for(&declaration.name) {
                    sink.set_constant(&declaration.name, value);
                }
            }
        }

        if let AttributeValues::PerPoint(values) = self.color {
            sink.set_array(COLOR_OUTPUT, ArrayValue::Rgb(values));
        }
        if let AttributeValues::PerPoint(values) = self.incandescence {
            sink.set_array(INCANDESCENCE_OUTPUT, ArrayValue::Rgb(values));
        }
        if let AttributeValues::PerPoint(values) = self.opacity {
            sink.set_array(OPACITY_OUTPUT, ArrayValue::Float(values));
        }

        let radius = match self.radius {
            AttributeValues::Constant(value) => vec![value],
            AttributeValues::PerPoint(values) => values,
        };
        sink.set_array("radius", ArrayValue::Float(radius));

        for extra in self.extras {
            let array = match extra.values {
                ExtraValues::Float(values) => ArrayValue::Float(values),
                ExtraValues::Vector(values) => ArrayValue::Vector(values),
            };
            sink.set_array(&extra.name, array);
        }

        sink.set_array(
            "points",
            ArrayValue::Points {
                keys: self.motion_steps,
                values: self.positions,
            },
        );
        sink.set_constant("mode", ConstantValue::Int(self.mode.index()));
        sink.set_constant("opaque", ConstantValue::Bool(false));
        if let Some(step_size) = self.step_size {
            sink.set_constant("step_size", ConstantValue::Float(step_size));
        }
    }

    fn constant_for(&self, name: &str) -> Option<ConstantValue> {
        match (name, &self.color, &self.incandescence, &self.opacity) {
            (COLOR_OUTPUT, AttributeValues::Constant(rgb), _, _) => Some(ConstantValue::Rgb(*rgb)),
            (INCANDESCENCE_OUTPUT, _, AttributeValues::Constant(rgb), _) => {
                Some(ConstantValue::Rgb(*rgb))
            }
            (OPACITY_OUTPUT, _, _, AttributeValues::Constant(value)) => {
                Some(ConstantValue::Float(*value))
            }
            _ => None,
        }
    }
}

fn role_declaration(name: &str, per_point: bool, value_type: ValueType) -> Declaration {
    if per_point {
        Declaration::uniform(name, value_type)
    } else {
        Declaration::constant(name, value_type)
    }
}

/// One call made on a `RecordingSink`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "call", rename_all = "snake_case")]
pub enum SinkCall {
    Declare(Declaration),
    SetConstant { name: String, value: ConstantValue },
    SetArray { name: String, array: ArrayValue },
}

/// A sink that records every call in order.
#[derive(Debug, Default, Serialize)]
#[serde(transparent)]
pub struct RecordingSink {
    calls: Vec<SinkCall>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> &[SinkCall] {
        &self.calls
    }

    pub fn declaration(&self, name: &str) -> Option<&Declaration> {
        self.calls.iter().find_map(|call| match call {
            SinkCall::Declare(declaration) if declaration.name == name => Some(declaration),
            _ => None,
        })
    }

    pub fn constant(&self, name: &str) -> Option<&ConstantValue> {
        self.calls.iter().find_map(|call| match call {
            SinkCall::SetConstant { name: n, value } if n == name => Some(value),
            _ => None,
        })
    }

    pub fn array(&self, name: &str) -> Option<&ArrayValue> {
        self.calls.iter().find_map(|call| match call {
            SinkCall::SetArray { name: n, array } if n == name => Some(array),
            _ => None,
        })
    }

    /// Index of the first call touching `name`.
    pub fn first_call_for(&self, name: &str) -> Option<usize> {
        self.calls.iter().position(|call| match call {
            SinkCall::Declare(declaration) => declaration.name == name,
            SinkCall::SetConstant { name: n, .. } | SinkCall::SetArray { name: n, .. } => n == name,
        })
    }
}

impl RendererSink for RecordingSink {
    fn declare(&mut self, declaration: &Declaration) {
        self.calls.push(SinkCall::Declare(declaration.clone()));
    }

    fn set_constant(&mut self, name: &str, value: ConstantValue) {
        self.calls.push(SinkCall::SetConstant {
            name: name.to_string(),
            value,
        });
    }

    fn set_array(&mut self, name: &str, array: ArrayValue) {
        self.calls.push(SinkCall::SetArray {
            name: name.to_string(),
            array,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_points() -> PointsPrimitive {
        PointsPrimitive {
            point_count: 2,
            motion_steps: 2,
            positions: vec![
                Vec3::new(0.0, 0.0, 0.0),
                Vec3::new(1.0, 0.0, 0.0),
                Vec3::new(0.0, 1.0, 0.0),
                Vec3::new(1.0, 1.0, 0.0),
            ],
            radius: AttributeValues::Constant(0.1),
            color: AttributeValues::PerPoint(vec![[1.0, 0.0, 0.0], [0.0, 1.0, 0.0]]),
            incandescence: AttributeValues::Constant([0.0; 3]),
            opacity: AttributeValues::Constant(0.75),
            extras: vec![ExtraArray {
                name: "age".to_string(),
                values: ExtraValues::Float(vec![1.0, 2.0]),
            }],
            mode: RenderMode::Spheres,
            step_size: Some(0.5),
        }
    }

    #[test]
    fn test_position_indexing_is_key_major() {
        let primitive = two_points();
        assert_eq!(primitive.position(0, 1), Some(Vec3::new(1.0, 0.0, 0.0)));
        assert_eq!(primitive.position(1, 0), Some(Vec3::new(0.0, 1.0, 0.0)));
        assert_eq!(primitive.position(2, 0), None);
    }

    #[test]
    fn test_submit_declares_before_values() {
        let mut sink = RecordingSink::new();
        two_points().submit(&mut sink);

        for name in ["rgbPP", "incandescencePP", "opacityPP", "age"] {
            let first = sink.first_call_for(name).unwrap();
            assert!(
                matches!(sink.calls()[first], SinkCall::Declare(_)),
                "{} must be declared first",
                name
            );
        }

        assert_eq!(sink.declaration("rgbPP").unwrap().scope, Scope::Uniform);
        assert_eq!(sink.declaration("opacityPP").unwrap().scope, Scope::Constant);
        assert_eq!(sink.constant("opacityPP"), Some(&ConstantValue::Float(0.75)));
        assert_eq!(sink.constant("incandescencePP"), Some(&ConstantValue::Rgb([0.0; 3])));
        assert!(sink.array("opacityPP").is_none());
        assert_eq!(sink.array("radius"), Some(&ArrayValue::Float(vec![0.1])));
        assert_eq!(sink.array("rgbPP").unwrap().len(), 2);
        assert_eq!(sink.array("points").unwrap().len(), 4);
        assert_eq!(sink.constant("mode"), Some(&ConstantValue::Int(1)));
        assert_eq!(sink.constant("opaque"), Some(&ConstantValue::Bool(false)));
        assert_eq!(sink.constant("step_size"), Some(&ConstantValue::Float(0.5)));
    }

    #[test]
    fn test_empty_primitive_submits_nothing() {
        let mut sink = RecordingSink::new();
        PointsPrimitive::empty(RenderMode::Points).submit(&mut sink);
        assert!(sink.calls().is_empty());
    }

    #[test]
    fn test_recording_serializes() {
        let mut sink = RecordingSink::new();
        two_points().submit(&mut sink);
        let json = serde_json::to_string(&sink).unwrap();
        assert!(json.contains("\"call\":\"declare\""));
        assert!(json.contains("\"name\":\"points\""));
    }
}
