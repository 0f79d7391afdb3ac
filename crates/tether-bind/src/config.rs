//! Binding Configuration

/// Binding engine configuration options
#[derive(Debug, Clone)]
pub struct BindConfig {
    /// Prefix of attribute/field binds (`@title="Expr"`)
    pub attr_prefix: char,

    /// Prefix of binder binds (`#each="Expr"`)
    pub binder_prefix: char,

    /// Structurally transparent wrapper tag
    pub ghost_tag: String,

    /// Placeholder for a component's contents inside its template
    pub contents_tag: String,

    /// Attribute holding the logical page id of a page link
    pub page_attr: String,

    /// Attribute receiving the processed bindings when `debug_bind_info` is on
    pub bind_info_attr: String,

    /// Record processed bindings on each element
    pub debug_bind_info: bool,

    /// Name the `each` binder exposes the item under when no outputs are given
    pub default_output: String,
}

impl Default for BindConfig {
    fn default() -> Self {
        Self {
            attr_prefix: '@',
            binder_prefix: '#',
            ghost_tag: "w-ghost".to_string(),
            contents_tag: "wcontents".to_string(),
            page_attr: "data-page".to_string(),
            bind_info_attr: "data-bind-info".to_string(),
            debug_bind_info: false,
            default_output: "_".to_string(),
        }
    }
}
