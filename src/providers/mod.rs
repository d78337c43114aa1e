//! Built-in provider definitions.
//!
//! Each provider module describes how the standard variables (see
//! [`TemplateSet::standard`](crate::config::TemplateSet::standard)) are found in that
//! provider's files, and builds a [`SourceLoader`] for it from the provider's
//! configuration entry. Use [`build`] to get the loader of a provider by name.
use std::sync::Arc;

use crate::{
    config::{ProvidersConfig, TemplateSet},
    error::ConfigurationError,
    loaders::{DateParts, RawReader, SourceLoader},
    units,
    variables::{Alias, VariableDescriptor},
};

pub mod glodap;
pub mod ices;
pub mod imr;
#[cfg(feature = "netcdf")]
pub mod argo;

/// Variables without which a provider's data is not usable.
pub const REQUIRED_VARIABLES: &[&str] = &["DATE", "LATITUDE", "LONGITUDE", "DEPH"];

/// Variable holding each row's provider name.
pub const PROVIDER_LABEL: &str = "PROVIDER";

/// Drop group of the nutrient and chlorophyll variables: rows where all are missing are dropped.
pub const NUTRIENTS_GROUP: &str = "nutrients";

/// Names accepted by [`build`].
pub fn builtin_providers() -> Vec<&'static str> {
    let mut names = vec![glodap::NAME, imr::NAME, ices::NAME];
    #[cfg(feature = "netcdf")]
    names.push(argo::NAME);
    names
}

/// The loader for the built-in provider `name`, configured by its entry in `config`.
pub fn build(name: &str, templates: &TemplateSet, config: &ProvidersConfig) -> Result<SourceLoader, ConfigurationError> {
    let provider_config = config.get(name)?;
    match name {
        glodap::NAME => glodap::loader(templates, provider_config),
        imr::NAME => imr::loader(templates, provider_config),
        ices::NAME => ices::loader(templates, provider_config),
        #[cfg(feature = "netcdf")]
        argo::NAME => argo::loader(templates, provider_config),
        _ => Err(ConfigurationError::UnknownProvider(name.to_string())),
    }
}

pub(crate) fn in_file(templates: &TemplateSet, id: &str, columns: &[&str]) -> Result<VariableDescriptor, ConfigurationError> {
    let aliases = columns.iter().map(|c| Alias::column(*c)).collect();
    templates.get(id)?.bind_as(aliases)
}

/// Convert the values of `descriptor` from the provider's `unit` to the variable's unit.
pub(crate) fn from_unit(descriptor: VariableDescriptor, unit: &str) -> Result<VariableDescriptor, ConfigurationError> {
    let correction = units::conversion_correction(unit, descriptor.unit())?;
    descriptor.with_correction(correction)
}

pub(crate) fn not_in_file(templates: &TemplateSet, id: &str) -> Result<VariableDescriptor, ConfigurationError> {
    Ok(templates.get(id)?.unbound())
}

pub(crate) fn configure(loader: SourceLoader) -> SourceLoader {
    loader.with_required(REQUIRED_VARIABLES)
        .with_provider_label(PROVIDER_LABEL)
        .with_date_parts(DateParts::default())
}

pub(crate) fn reader<R: RawReader + 'static>(r: R) -> Arc<dyn RawReader> {
    Arc::new(r)
}
