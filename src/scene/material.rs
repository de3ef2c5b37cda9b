//! Material definitions for PBR rendering

use bytemuck::{Pod, Zeroable};
use glam::{UVec4, Vec3, Vec4};

/// How a material treats alpha
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum AlphaMode {
    #[default]
    Opaque,
    /// Alpha tested against a cutoff; still depth-writes like opaque geometry.
    Mask { cutoff: f32 },
    /// Alpha blended
    Blend,
}

impl AlphaMode {
    const OPAQUE: u32 = 0;
    const MASK: u32 = 1;
    const BLEND: u32 = 2;

    fn encode(&self) -> (u32, f32) {
        match *self {
            AlphaMode::Opaque => (Self::OPAQUE, 0.0),
            AlphaMode::Mask { cutoff } => (Self::MASK, cutoff),
            AlphaMode::Blend => (Self::BLEND, 0.0),
        }
    }
}

/// PBR material properties
#[derive(Debug, Clone, PartialEq)]
pub struct Material {
    pub name: String,
    pub base_color: Vec4,
    pub metallic: f32,
    pub roughness: f32,
    pub emissive: Vec3,
    pub emissive_strength: f32,
    pub alpha_mode: AlphaMode,
}

impl Default for Material {
    fn default() -> Self {
        Self {
            name: "default".to_string(),
            base_color: Vec4::new(1.0, 1.0, 1.0, 1.0),
            metallic: 0.0,
            roughness: 0.5,
            emissive: Vec3::ZERO,
            emissive_strength: 1.0,
            alpha_mode: AlphaMode::Opaque,
        }
    }
}

impl Material {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Default::default()
        }
    }

    pub fn with_base_color(mut self, color: Vec4) -> Self {
        self.base_color = color;
        self
    }

    pub fn with_metallic(mut self, metallic: f32) -> Self {
        self.metallic = metallic;
        self
    }

    pub fn with_roughness(mut self, roughness: f32) -> Self {
        self.roughness = roughness;
        self
    }

    pub fn with_emissive(mut self, emissive: Vec3, strength: f32) -> Self {
        self.emissive = emissive;
        self.emissive_strength = strength;
        self
    }

    pub fn with_alpha_mode(mut self, alpha_mode: AlphaMode) -> Self {
        self.alpha_mode = alpha_mode;
        self
    }

    /// Opaque and alpha-tested materials both go to the opaque run.
    pub fn is_opaque(&self) -> bool {
        !matches!(self.alpha_mode, AlphaMode::Blend)
    }

    /// Convert to GPU data format
    pub fn to_gpu_data(&self) -> GpuMaterial {
        let (mode, cutoff) = self.alpha_mode.encode();
        GpuMaterial {
            base_color: self.base_color,
            emissive: self.emissive.extend(self.emissive_strength),
            params: Vec4::new(self.metallic, self.roughness, cutoff, 0.0),
            flags: UVec4::new(mode, 0, 0, 0),
        }
    }
}

/// Material block as laid out in the material uniform table
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct GpuMaterial {
    pub base_color: Vec4,
    /// xyz = emissive color, w = strength
    pub emissive: Vec4,
    /// x = metallic, y = roughness, z = alpha cutoff
    pub params: Vec4,
    /// x = alpha mode (0 = opaque, 1 = mask, 2 = blend)
    pub flags: UVec4,
}

impl GpuMaterial {
    pub fn is_opaque(&self) -> bool {
        self.flags.x != AlphaMode::BLEND
    }
}

static_assertions::const_assert_eq!(std::mem::size_of::<GpuMaterial>(), 64);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_opacity_classification() {
        assert!(Material::new("stone").is_opaque());
        assert!(Material::new("leaves")
            .with_alpha_mode(AlphaMode::Mask { cutoff: 0.5 })
            .is_opaque());
        assert!(!Material::new("glass").with_alpha_mode(AlphaMode::Blend).is_opaque());
    }

    #[test]
    fn test_gpu_data_preserves_opacity() {
        let glass = Material::new("glass").with_alpha_mode(AlphaMode::Blend).to_gpu_data();
        assert!(!glass.is_opaque());

        let leaves = Material::new("leaves")
            .with_alpha_mode(AlphaMode::Mask { cutoff: 0.25 })
            .with_roughness(0.8)
            .to_gpu_data();
        assert!(leaves.is_opaque());
        assert_eq!(leaves.params, Vec4::new(0.0, 0.8, 0.25, 0.0));
    }
}
