//! Target capabilities and volume texture format selection.

/// What the rendering target supports.
///
/// Queried from the backend at runtime; nothing here is decided by
/// compile-time platform checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextureCaps {
    /// Largest extent of a 3D texture along any axis.
    pub max_3d_dim: u32,
    /// Whether `R32Float` 3D textures can be sampled with linear filtering.
    pub float32_filterable: bool,
    /// Mobile/standalone headset class memory.
    pub memory_constrained: bool,
}

impl Default for TextureCaps {
    fn default() -> Self {
        Self::desktop()
    }
}

impl TextureCaps {
    /// Typical desktop GPU.
    pub const fn desktop() -> Self {
        Self {
            max_3d_dim: 2048,
            float32_filterable: true,
            memory_constrained: false,
        }
    }

    /// Standalone headset / mobile GPU.
    pub const fn constrained() -> Self {
        Self {
            max_3d_dim: 2048,
            float32_filterable: false,
            memory_constrained: true,
        }
    }

    /// True when every axis of `dim` fits.
    pub fn fits(&self, dim: [u32; 3]) -> bool {
        dim.iter().all(|&d| d <= self.max_3d_dim)
    }
}

/// Storage format of the label and weight 3D textures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VolumeFormat {
    /// 8-bit normalized.
    R8Unorm,
    /// 16-bit float.
    R16Float,
    /// 32-bit float.
    R32Float,
}

impl VolumeFormat {
    /// Picks the format for a target.
    ///
    /// | Target                      | Format     |
    /// |-----------------------------|------------|
    /// | memory constrained          | `R8Unorm`  |
    /// | filterable 32-bit float     | `R32Float` |
    /// | otherwise                   | `R16Float` |
    pub fn select(caps: &TextureCaps) -> Self {
        if caps.memory_constrained {
            Self::R8Unorm
        } else if caps.float32_filterable {
            Self::R32Float
        } else {
            Self::R16Float
        }
    }

    /// Bytes per texel.
    pub const fn bytes_per_texel(self) -> usize {
        match self {
            Self::R8Unorm => 1,
            Self::R16Float => 2,
            Self::R32Float => 4,
        }
    }

    /// Short name for logs.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::R8Unorm => "R8Unorm",
            Self::R16Float => "R16Float",
            Self::R32Float => "R32Float",
        }
    }
}
