//! Value types and literal constants for the nabla IR.
//!
//! The interesting part is [`TensorMeta::requires_grad`]: a three-state
//! annotation (absent / resolved-`true` / resolved-`false`). Absence means
//! "no profiling information was observed" and is never defaulted to
//! `false` — fabricating a resolution the profiler did not provide would
//! silently change autodiff behavior downstream.

/// Metadata attached to a tensor-typed value.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub struct TensorMeta {
    /// Whether this tensor participates in gradient computation.
    /// `None` until profiling information resolves it one way or the other.
    pub requires_grad: Option<bool>,
}

/// The type of a [`Value`](crate::Value).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Type {
    /// A numeric array. Carries the requires-grad annotation.
    Tensor(TensorMeta),
    /// A plain integer (loop counters, chunk counts).
    Int,
    /// A boolean (branch conditions).
    Bool,
}

impl Type {
    /// An unannotated tensor type.
    #[inline]
    pub fn tensor() -> Self {
        Type::Tensor(TensorMeta::default())
    }

    /// A tensor type with a resolved requires-grad annotation.
    #[inline]
    pub fn tensor_requiring_grad(requires_grad: bool) -> Self {
        Type::Tensor(TensorMeta {
            requires_grad: Some(requires_grad),
        })
    }

    /// The tensor metadata, if this is a tensor type.
    #[inline]
    pub fn as_tensor(&self) -> Option<&TensorMeta> {
        match self {
            Type::Tensor(meta) => Some(meta),
            _ => None,
        }
    }

    /// Returns `true` if this is a tensor type.
    #[inline]
    pub fn is_tensor(&self) -> bool {
        matches!(self, Type::Tensor(_))
    }

    /// The requires-grad annotation, if this is a tensor and it is resolved.
    #[inline]
    pub fn requires_grad(&self) -> Option<bool> {
        match self {
            Type::Tensor(meta) => meta.requires_grad,
            _ => None,
        }
    }

    /// A copy of this type with the requires-grad annotation set.
    ///
    /// Only meaningful for tensor types; other types are returned unchanged.
    #[inline]
    pub fn with_requires_grad(self, requires_grad: bool) -> Self {
        match self {
            Type::Tensor(_) => Type::Tensor(TensorMeta {
                requires_grad: Some(requires_grad),
            }),
            other => other,
        }
    }
}

/// A literal constant carried by a `Constant` node.
///
/// Floats are stored as raw bits so the type can be `Eq + Hash`, which the
/// structural deduplication pass keys on.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Constant {
    Int(i64),
    Float(u64),
    Bool(bool),
}

impl Constant {
    /// Build a float constant from an `f64`.
    #[inline]
    pub fn float(value: f64) -> Self {
        Constant::Float(value.to_bits())
    }

    /// Read a float constant back as `f64`.
    #[inline]
    pub fn as_f64(self) -> Option<f64> {
        match self {
            Constant::Float(bits) => Some(f64::from_bits(bits)),
            _ => None,
        }
    }

    /// The IR type a constant of this kind produces.
    #[inline]
    pub fn ty(self) -> Type {
        match self {
            Constant::Int(_) => Type::Int,
            Constant::Float(_) => Type::tensor(),
            Constant::Bool(_) => Type::Bool,
        }
    }
}
