//! Target data layout: store sizes and alignment.

use crate::module::Module;
use crate::types::Ty;

/// Answers type sizes for a 64-bit little-endian target.
#[derive(Clone, Copy, Debug)]
pub struct DataLayout {
    pub pointer_size: u64,
}

impl Default for DataLayout {
    fn default() -> Self {
        Self { pointer_size: 8 }
    }
}

impl DataLayout {
    /// The alignment of a type in bytes.
    pub fn align(&self, module: &Module, ty: &Ty) -> u64 {
        match ty {
            Ty::Void => 1,
            Ty::Int(bits) => u64::from(bits.div_ceil(8)).max(1).min(8),
            Ty::Float => 4,
            Ty::Double => 8,
            Ty::Ptr(_) | Ty::Func(_) => self.pointer_size,
            Ty::Array(inner, _) => self.align(module, inner),
            Ty::Struct(id) => {
                let def = module.struct_def(*id);
                def.fields
                    .as_ref()
                    .map(|fields| self.fields_align(module, fields))
                    .unwrap_or(1)
            }
            Ty::Anon(fields) => self.fields_align(module, fields),
        }
    }

    fn fields_align(&self, module: &Module, fields: &[Ty]) -> u64 {
        fields
            .iter()
            .map(|f| self.align(module, f))
            .max()
            .unwrap_or(1)
    }

    /// The number of bytes a stored value of `ty` occupies.
    pub fn store_size(&self, module: &Module, ty: &Ty) -> u64 {
        match ty {
            Ty::Void => 0,
            Ty::Int(bits) => u64::from(bits.div_ceil(8)).max(1),
            Ty::Float => 4,
            Ty::Double => 8,
            Ty::Ptr(_) | Ty::Func(_) => self.pointer_size,
            Ty::Array(inner, len) => self.store_size(module, inner) * len,
            Ty::Struct(id) => {
                let def = module.struct_def(*id);
                def.fields
                    .as_ref()
                    .map(|fields| self.fields_size(module, fields))
                    .unwrap_or(0)
            }
            Ty::Anon(fields) => self.fields_size(module, fields),
        }
    }

    /// The byte offset of field `index` in a struct with the given fields.
    pub fn field_offset(&self, module: &Module, fields: &[Ty], index: usize) -> u64 {
        let mut offset = 0u64;

        for (i, field) in fields.iter().enumerate() {
            let align = self.align(module, field);
            offset = offset.next_multiple_of(align);

            if i == index {
                return offset;
            }

            offset += self.store_size(module, field);
        }

        offset
    }

    fn fields_size(&self, module: &Module, fields: &[Ty]) -> u64 {
        let mut offset = 0u64;

        for field in fields {
            let align = self.align(module, field);
            offset = offset.next_multiple_of(align);
            offset += self.store_size(module, field);
        }

        offset.next_multiple_of(self.fields_align(module, fields))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scalar_sizes() {
        let module = Module::new("test");
        let layout = DataLayout::default();

        assert_eq!(layout.store_size(&module, &Ty::Int(1)), 1);
        assert_eq!(layout.store_size(&module, &Ty::Int(32)), 4);
        assert_eq!(layout.store_size(&module, &Ty::Double), 8);
        assert_eq!(layout.store_size(&module, &Ty::ptr_to(Ty::Int(8))), 8);
    }

    #[test]
    fn struct_size_includes_padding() {
        let mut module = Module::new("test");
        let id = module.add_struct("S");
        module.set_struct_body(id, vec![Ty::Int(8), Ty::Int(64)]);

        let layout = DataLayout::default();
        assert_eq!(layout.store_size(&module, &Ty::Struct(id)), 16);
        assert_eq!(
            layout.field_offset(&module, &[Ty::Int(8), Ty::Int(64)], 1),
            8
        );
    }

    #[test]
    fn array_size_multiplies() {
        let module = Module::new("test");
        let layout = DataLayout::default();
        assert_eq!(
            layout.store_size(&module, &Ty::array_of(Ty::Int(32), 5)),
            20
        );
    }
}
