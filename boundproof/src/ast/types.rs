//! Type AST nodes

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::ExprRef;

/// Fixed-width integer types; each restricts its values to `[min, max]`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NumType {
    I8,
    I16,
    I32,
    I64,
    U8,
    U16,
    U32,
    U64,
}

impl NumType {
    pub fn from_name(name: &str) -> Option<NumType> {
        let ty = match name {
            "i8" => NumType::I8,
            "i16" => NumType::I16,
            "i32" => NumType::I32,
            "i64" => NumType::I64,
            "u8" => NumType::U8,
            "u16" => NumType::U16,
            "u32" => NumType::U32,
            "u64" => NumType::U64,
            _ => return None,
        };
        Some(ty)
    }

    pub fn name(self) -> &'static str {
        match self {
            NumType::I8 => "i8",
            NumType::I16 => "i16",
            NumType::I32 => "i32",
            NumType::I64 => "i64",
            NumType::U8 => "u8",
            NumType::U16 => "u16",
            NumType::U32 => "u32",
            NumType::U64 => "u64",
        }
    }

    pub fn bits(self) -> u32 {
        match self {
            NumType::I8 | NumType::U8 => 8,
            NumType::I16 | NumType::U16 => 16,
            NumType::I32 | NumType::U32 => 32,
            NumType::I64 | NumType::U64 => 64,
        }
    }

    pub fn is_signed(self) -> bool {
        matches!(self, NumType::I8 | NumType::I16 | NumType::I32 | NumType::I64)
    }

    /// Inclusive value range
    pub fn bounds(self) -> (i128, i128) {
        let bits = self.bits();
        if self.is_signed() {
            (-(1i128 << (bits - 1)), (1i128 << (bits - 1)) - 1)
        } else {
            (0, (1i128 << bits) - 1)
        }
    }
}

/// Inclusive refinement `[lo..hi]`; either side may be omitted
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Refinement {
    pub lo: Option<ExprRef>,
    pub hi: Option<ExprRef>,
}

/// Type expression
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TypeExpr {
    /// `name`, `pkg.name`, optionally refined: `u32[..100]`
    Named {
        package: Option<String>,
        name: String,
        refinement: Option<Refinement>,
    },
    /// `ptr T`
    Ptr(Arc<TypeExpr>),
    /// `[N] T`
    Array { len: ExprRef, elem: Arc<TypeExpr> },
    /// `[] T`
    Slice(Arc<TypeExpr>),
}

impl TypeExpr {
    pub fn named(name: impl Into<String>) -> Arc<TypeExpr> {
        Arc::new(TypeExpr::Named {
            package: None,
            name: name.into(),
            refinement: None,
        })
    }

    pub fn num(ty: NumType) -> Arc<TypeExpr> {
        TypeExpr::named(ty.name())
    }

    /// The underlying fixed-width integer type, ignoring any refinement
    pub fn num_type(&self) -> Option<NumType> {
        match self {
            TypeExpr::Named {
                package: None,
                name,
                ..
            } => NumType::from_name(name),
            _ => None,
        }
    }

    /// Values a variable of this type may hold: the integer type's range,
    /// narrowed by any constant refinement bounds.
    pub fn range(&self) -> Option<(i128, i128)> {
        let (mut lo, mut hi) = self.num_type()?.bounds();
        if let TypeExpr::Named {
            refinement: Some(r),
            ..
        } = self
        {
            if let Some(v) = r.lo.as_ref().and_then(|e| e.const_value()) {
                lo = lo.max(v);
            }
            if let Some(v) = r.hi.as_ref().and_then(|e| e.const_value()) {
                hi = hi.min(v);
            }
        }
        Some((lo, hi))
    }

    /// Constant element count of an array type
    pub fn array_len(&self) -> Option<i128> {
        match self {
            TypeExpr::Array { len, .. } => len.const_value(),
            _ => None,
        }
    }

    /// Element type of arrays, slices and pointers to either
    pub fn element(&self) -> Option<&Arc<TypeExpr>> {
        match self {
            TypeExpr::Array { elem, .. } | TypeExpr::Slice(elem) => Some(elem),
            TypeExpr::Ptr(inner) => inner.element(),
            TypeExpr::Named { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::Expr;

    #[test]
    fn test_num_type_bounds() {
        assert_eq!(NumType::U8.bounds(), (0, 255));
        assert_eq!(NumType::I8.bounds(), (-128, 127));
        assert_eq!(NumType::U64.bounds(), (0, u64::MAX as i128));
        assert_eq!(NumType::I64.bounds(), (i64::MIN as i128, i64::MAX as i128));
    }

    #[test]
    fn test_refined_range() {
        let ty = TypeExpr::Named {
            package: None,
            name: "u32".to_string(),
            refinement: Some(Refinement {
                lo: None,
                hi: Some(Expr::int(100)),
            }),
        };
        assert_eq!(ty.range(), Some((0, 100)));

        let opaque = TypeExpr::Named {
            package: Some("pkg".to_string()),
            name: "u32".to_string(),
            refinement: None,
        };
        assert_eq!(opaque.range(), None);
    }

    #[test]
    fn test_array_len_and_element() {
        let ty = TypeExpr::Array {
            len: Expr::int(16),
            elem: TypeExpr::num(NumType::U8),
        };
        assert_eq!(ty.array_len(), Some(16));
        assert_eq!(ty.element().and_then(|e| e.num_type()), Some(NumType::U8));
        assert_eq!(TypeExpr::Slice(TypeExpr::num(NumType::U8)).array_len(), None);
    }
}
