//! Resolved materials: what each mesh node is drawn with.

use std::{collections::HashMap, sync::Arc};

use crate::{mtl::MtlMaterial, texture::TextureData};

/// Solid color used when a node has no texture and no known material.
pub const FALLBACK_COLOR: u32 = 0xff6600;

/// `0xRRGGBB` to sRGB components in `[0, 1]`.
pub fn rgb_from_hex(hex: u32) -> [f32; 3] {
    [
        ((hex >> 16) & 0xff) as f32 / 255.0,
        ((hex >> 8) & 0xff) as f32 / 255.0,
        (hex & 0xff) as f32 / 255.0,
    ]
}

/// Material bound to one mesh node. Colors are sRGB in `[0, 1]`.
#[derive(Clone, Debug, PartialEq)]
pub enum MaterialRef {
    /// Texture modulated by a tint.
    Textured {
        texture: Arc<TextureData>,
        tint: [f32; 3],
    },
    Solid { color: [f32; 3] },
}

impl MaterialRef {
    pub fn fallback() -> Self {
        Self::Solid {
            color: rgb_from_hex(FALLBACK_COLOR),
        }
    }

    pub fn textured(texture: Arc<TextureData>) -> Self {
        Self::Textured {
            texture,
            tint: [1.0, 1.0, 1.0],
        }
    }

    pub fn is_textured(&self) -> bool {
        matches!(self, Self::Textured { .. })
    }
}

/// Materials from an MTL file with their diffuse maps already decoded.
#[derive(Clone, Debug, Default)]
pub struct MaterialLibrary {
    materials: HashMap<String, MaterialRef>,
}

impl MaterialLibrary {
    /// Build from parsed MTL entries and the textures preloaded for them,
    /// keyed by the `map_Kd` path as written in the file. Entries whose map
    /// is missing from `textures` fall back to their diffuse color.
    pub fn from_mtl(
        materials: Vec<MtlMaterial>,
        textures: &HashMap<String, Arc<TextureData>>,
    ) -> Self {
        let materials = materials
            .into_iter()
            .map(|m| {
                let resolved = match m.diffuse_map.as_ref().and_then(|p| textures.get(p)) {
                    Some(texture) => MaterialRef::Textured {
                        texture: Arc::clone(texture),
                        tint: m.diffuse,
                    },
                    None => MaterialRef::Solid { color: m.diffuse },
                };
                (m.name, resolved)
            })
            .collect();
        Self { materials }
    }

    pub fn get(&self, name: &str) -> Option<&MaterialRef> {
        self.materials.get(name)
    }

    /// Material for a node; unknown or missing names get the fallback.
    pub fn resolve(&self, name: Option<&str>) -> MaterialRef {
        match name.and_then(|n| self.materials.get(n)) {
            Some(m) => m.clone(),
            None => {
                if let Some(n) = name {
                    log::warn!("Material '{}' not found in library; using fallback", n);
                }
                MaterialRef::fallback()
            }
        }
    }

    pub fn len(&self) -> usize {
        self.materials.len()
    }

    pub fn is_empty(&self) -> bool {
        self.materials.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mtl::parse_mtl;

    #[test]
    fn hex_decodes_to_unit_rgb() {
        assert_eq!(rgb_from_hex(0xff0000), [1.0, 0.0, 0.0]);
        let c = rgb_from_hex(0x433f81);
        assert!((c[2] - 0x81 as f32 / 255.0).abs() < 1e-6);
    }

    #[test]
    fn library_binds_preloaded_maps() {
        let mats = parse_mtl("newmtl a\nKd 0.5 0.5 0.5\nmap_Kd a.png\nnewmtl b\nKd 0 1 0\nmap_Kd gone.png\n")
            .unwrap();
        let tex = Arc::new(TextureData::solid([9, 9, 9]));
        let mut textures = HashMap::new();
        textures.insert("a.png".to_string(), Arc::clone(&tex));

        let lib = MaterialLibrary::from_mtl(mats, &textures);
        assert_eq!(lib.len(), 2);
        assert_eq!(
            lib.resolve(Some("a")),
            MaterialRef::Textured {
                texture: tex,
                tint: [0.5, 0.5, 0.5]
            }
        );
        assert_eq!(lib.resolve(Some("b")), MaterialRef::Solid { color: [0.0, 1.0, 0.0] });
        assert_eq!(lib.resolve(Some("nope")), MaterialRef::fallback());
        assert_eq!(lib.resolve(None), MaterialRef::fallback());
    }
}
