//! Resource reflection over compiled naga modules

use naga::{AddressSpace, Module, TypeInner};

/// What a named uniform resolves to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UniformKind {
    /// Member of a uniform block, or the whole block when `offset` is 0 and
    /// `size` equals `block_size`
    Block {
        offset: u32,
        size: u32,
        block_size: u32,
    },
    Texture,
    Sampler,
}

/// Location of a uniform within a program's bind groups
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UniformLocation {
    pub group: u32,
    pub binding: u32,
    pub kind: UniformKind,
}

/// A bound global of a module
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceBinding {
    pub name: String,
    pub group: u32,
    pub binding: u32,
    pub kind: ResourceKind,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResourceKind {
    UniformBlock {
        size: u32,
        /// Member names with their byte offset and size
        members: Vec<(String, u32, u32)>,
    },
    Texture,
    Sampler,
}

/// Every uniform block, texture and sampler bound by `module`
pub fn resource_bindings(module: &Module) -> Vec<ResourceBinding> {
    let mut resources = Vec::new();

    for (_, var) in module.global_variables.iter() {
        let Some(binding) = var.binding.as_ref() else {
            continue;
        };
        let ty = &module.types[var.ty];
        let type_name = ty.name.as_deref();

        let kind = match (var.space, &ty.inner) {
            (AddressSpace::Uniform, TypeInner::Struct { members, span }) => {
                ResourceKind::UniformBlock {
                    size: *span,
                    members: members
                        .iter()
                        .filter_map(|m| {
                            let name = m.name.clone()?;
                            let size = module.types[m.ty].inner.size(module.to_ctx());
                            Some((name, m.offset, size))
                        })
                        .collect(),
                }
            }
            (AddressSpace::Handle, TypeInner::Image { .. }) => ResourceKind::Texture,
            (AddressSpace::Handle, TypeInner::Sampler { .. }) => ResourceKind::Sampler,
            _ => continue,
        };

        // Blocks declared without an instance name are named by their type
        let Some(name) = var.name.as_deref().or(type_name) else {
            continue;
        };

        resources.push(ResourceBinding {
            name: name.to_string(),
            group: binding.group,
            binding: binding.binding,
            kind,
        });
    }

    resources
}

/// Find `name` as a bound resource, a block type name or a block member
pub fn find_uniform(module: &Module, name: &str) -> Option<UniformLocation> {
    resource_bindings(module)
        .into_iter()
        .find_map(|resource| resource.locate(name))
}

impl ResourceBinding {
    /// Location of `name` within this resource, if it names it
    pub fn locate(&self, name: &str) -> Option<UniformLocation> {
        let kind = match &self.kind {
            ResourceKind::UniformBlock { size, members } => {
                if self.name == name {
                    UniformKind::Block {
                        offset: 0,
                        size: *size,
                        block_size: *size,
                    }
                } else {
                    let (_, offset, member_size) =
                        members.iter().find(|(member, _, _)| member == name)?;
                    UniformKind::Block {
                        offset: *offset,
                        size: *member_size,
                        block_size: *size,
                    }
                }
            }
            ResourceKind::Texture if self.name == name => UniformKind::Texture,
            ResourceKind::Sampler if self.name == name => UniformKind::Sampler,
            _ => return None,
        };

        Some(UniformLocation {
            group: self.group,
            binding: self.binding,
            kind,
        })
    }
}
