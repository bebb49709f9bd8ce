//! Caller-supplied parameters for the two external tools.
//!
//! Field names follow the tools' own PascalCase vocabulary so the stored
//! `mole.json` / `pores.json` documents can be read back verbatim. Missing
//! or `null` sections fall back to the tool defaults.

use serde::{Deserialize, Deserializer, Serialize};

use crate::error::CoreError;

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

// ---------------------------------------------------------------------------
// Channel tool (MOLE)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct MoleParameters {
    #[serde(deserialize_with = "null_as_default")]
    pub input: InputSection,
    #[serde(deserialize_with = "null_as_default")]
    pub cavity: CavitySection,
    #[serde(deserialize_with = "null_as_default")]
    pub tunnel: TunnelSection,
    #[serde(deserialize_with = "null_as_default")]
    pub non_active_residues: Vec<Residue>,
    #[serde(deserialize_with = "null_as_default")]
    pub query_filter: String,
    pub origin: Option<Origin>,
    pub custom_exits: Option<Origin>,
    pub pores_merged: bool,
    pub pores_auto: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct InputSection {
    #[serde(deserialize_with = "null_as_default")]
    pub specific_chains: String,
    pub read_all_models: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct CavitySection {
    #[serde(rename = "IgnoreHETAtoms")]
    pub ignore_het_atoms: bool,
    pub ignore_hydrogens: bool,
    pub interior_threshold: f64,
    pub probe_radius: f64,
}

impl Default for CavitySection {
    fn default() -> Self {
        Self {
            ignore_het_atoms: false,
            ignore_hydrogens: false,
            interior_threshold: 1.1,
            probe_radius: 5.0,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum WeightFunction {
    #[default]
    VoronoiScale,
    LengthAndRadius,
    Length,
    Constant,
}

impl WeightFunction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::VoronoiScale => "VoronoiScale",
            Self::LengthAndRadius => "LengthAndRadius",
            Self::Length => "Length",
            Self::Constant => "Constant",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct TunnelSection {
    pub weight_function: WeightFunction,
    pub bottleneck_radius: f64,
    pub bottleneck_tolerance: f64,
    pub max_tunnel_similarity: f64,
    pub origin_radius: f64,
    pub surface_cover_radius: f64,
}

impl Default for TunnelSection {
    fn default() -> Self {
        Self {
            weight_function: WeightFunction::VoronoiScale,
            bottleneck_radius: 1.25,
            bottleneck_tolerance: 3.0,
            max_tunnel_similarity: 0.7,
            origin_radius: 5.0,
            surface_cover_radius: 10.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Residue {
    pub chain: String,
    pub sequence_number: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Point3D {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

/// Starting points (or exits) for the channel search.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct Origin {
    #[serde(deserialize_with = "null_as_default")]
    pub points: Vec<Point3D>,
    #[serde(deserialize_with = "null_as_default")]
    pub query_expression: String,
    #[serde(deserialize_with = "null_as_default")]
    pub residues: Vec<Vec<Residue>>,
}

impl Origin {
    pub fn is_empty(&self) -> bool {
        self.points.is_empty() && self.query_expression.is_empty() && self.residues.is_empty()
    }
}

impl MoleParameters {
    /// Defaults with HET atom handling chosen by the caller.
    pub fn with_ignore_het(ignore_het_atoms: bool) -> Self {
        let mut params = Self::default();
        params.cavity.ignore_het_atoms = ignore_het_atoms;
        params
    }

    pub fn has_origin(&self) -> bool {
        self.origin.as_ref().is_some_and(|o| !o.is_empty())
    }

    pub fn has_custom_exits(&self) -> bool {
        self.custom_exits.as_ref().is_some_and(|o| !o.is_empty())
    }

    pub fn validate(&self) -> Result<(), CoreError> {
        validate_chains(&self.input.specific_chains)?;
        validate_positive("Cavity.ProbeRadius", self.cavity.probe_radius)?;
        validate_positive("Cavity.InteriorThreshold", self.cavity.interior_threshold)?;
        validate_positive("Tunnel.BottleneckRadius", self.tunnel.bottleneck_radius)?;
        validate_non_negative("Tunnel.BottleneckTolerance", self.tunnel.bottleneck_tolerance)?;
        validate_non_negative("Tunnel.OriginRadius", self.tunnel.origin_radius)?;
        validate_non_negative("Tunnel.SurfaceCoverRadius", self.tunnel.surface_cover_radius)?;

        let similarity = self.tunnel.max_tunnel_similarity;
        if !(0.0..=1.0).contains(&similarity) {
            return Err(CoreError::Validation(format!(
                "Tunnel.MaxTunnelSimilarity must be within [0, 1], got {similarity}"
            )));
        }

        validate_residues(&self.non_active_residues)?;
        for origin in [&self.origin, &self.custom_exits].into_iter().flatten() {
            for group in &origin.residues {
                validate_residues(group)?;
            }
            if origin.points.iter().any(|p| !(p.x.is_finite() && p.y.is_finite() && p.z.is_finite())) {
                return Err(CoreError::Validation(
                    "Point coordinates must be finite numbers".to_string(),
                ));
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Pore tool
// ---------------------------------------------------------------------------

/// Pore tool parameters as submitted by the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct PoresRequest {
    pub in_membrane: bool,
    pub is_beta_barel: bool,
    /// Comma separated chain identifiers; empty means all chains.
    #[serde(deserialize_with = "null_as_default")]
    pub chains: String,
    pub interior_threshold: f64,
    pub probe_radius: f64,
}

impl Default for PoresRequest {
    fn default() -> Self {
        Self {
            in_membrane: false,
            is_beta_barel: false,
            chains: String::new(),
            interior_threshold: 0.8,
            probe_radius: 13.0,
        }
    }
}

impl PoresRequest {
    pub fn validate(&self) -> Result<(), CoreError> {
        validate_chains(&self.chains)?;
        validate_positive("ProbeRadius", self.probe_radius)?;
        validate_positive("InteriorThreshold", self.interior_threshold)
    }

    pub fn chain_list(&self) -> Vec<String> {
        self.chains
            .split(',')
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .map(str::to_string)
            .collect()
    }
}

/// The flat parameter file consumed by the pore tool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PoresInput {
    pub in_membrane: bool,
    pub is_beta_barel: bool,
    /// Path of the structure file; set outside database mode.
    pub user_structure: Option<String>,
    /// Structure identifier; set in database mode.
    pub pdb_id: Option<String>,
    pub working_directory: String,
    pub chains: Vec<String>,
    pub py_mol_location: String,
    pub mem_embed_location: String,
    pub interior_threshold: f64,
    pub probe_radius: f64,
}

/// The caller-facing subset of [`PoresInput`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PoresUserParameters {
    pub in_membrane: bool,
    pub is_beta_barel: bool,
    pub chains: Vec<String>,
}

impl PoresInput {
    pub fn user_parameters(&self) -> PoresUserParameters {
        PoresUserParameters {
            in_membrane: self.in_membrane,
            is_beta_barel: self.is_beta_barel,
            chains: self.chains.clone(),
        }
    }
}

// ---------------------------------------------------------------------------
// Validation helpers
// ---------------------------------------------------------------------------

fn validate_positive(field: &str, value: f64) -> Result<(), CoreError> {
    if !value.is_finite() || value <= 0.0 {
        return Err(CoreError::Validation(format!(
            "{field} must be a positive number, got {value}"
        )));
    }
    Ok(())
}

fn validate_non_negative(field: &str, value: f64) -> Result<(), CoreError> {
    if !value.is_finite() || value < 0.0 {
        return Err(CoreError::Validation(format!(
            "{field} must not be negative, got {value}"
        )));
    }
    Ok(())
}

fn validate_chains(chains: &str) -> Result<(), CoreError> {
    if !chains
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == ',' || c == ' ')
    {
        return Err(CoreError::Validation(format!(
            "Chains may only contain letters, digits and commas: '{chains}'"
        )));
    }
    Ok(())
}

fn validate_residues(residues: &[Residue]) -> Result<(), CoreError> {
    for (i, residue) in residues.iter().enumerate() {
        if residue.chain.trim().is_empty() {
            return Err(CoreError::Validation(format!(
                "Residue at index {i} must name a chain"
            )));
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn empty_body_yields_tool_defaults() {
        let params: MoleParameters = serde_json::from_str("{}").expect("parse");
        assert_eq!(params, MoleParameters::default());
        assert_eq!(params.cavity.probe_radius, 5.0);
        assert_eq!(params.cavity.interior_threshold, 1.1);
        assert_eq!(params.tunnel.weight_function, WeightFunction::VoronoiScale);
        assert_eq!(params.tunnel.bottleneck_radius, 1.25);
    }

    #[test]
    fn null_sections_fall_back_to_defaults() {
        let params: MoleParameters = serde_json::from_str(
            r#"{"Input": null, "Cavity": null, "NonActiveResidues": null, "Origin": null}"#,
        )
        .expect("parse");
        assert_eq!(params.cavity, CavitySection::default());
        assert!(params.non_active_residues.is_empty());
        assert!(!params.has_origin());
    }

    #[test]
    fn tool_vocabulary_is_accepted() {
        let params: MoleParameters = serde_json::from_str(
            r#"{
                "Cavity": { "IgnoreHETAtoms": true, "ProbeRadius": 3.0 },
                "Tunnel": { "WeightFunction": "LengthAndRadius" },
                "Origin": { "Points": [{ "X": 1.0, "Y": 2.0, "Z": 3.0 }] },
                "CustomExits": { "Residues": [[{ "Chain": "A", "SequenceNumber": 42 }]] }
            }"#,
        )
        .expect("parse");
        assert!(params.cavity.ignore_het_atoms);
        assert_eq!(params.cavity.probe_radius, 3.0);
        assert_eq!(params.cavity.interior_threshold, 1.1);
        assert_eq!(params.tunnel.weight_function, WeightFunction::LengthAndRadius);
        assert!(params.has_origin());
        assert!(params.has_custom_exits());

        let json = serde_json::to_value(&params).expect("serialize");
        assert_eq!(json["Cavity"]["IgnoreHETAtoms"], true);
    }

    #[test]
    fn empty_origin_counts_as_absent() {
        let params: MoleParameters =
            serde_json::from_str(r#"{"Origin": {"Points": [], "QueryExpression": ""}}"#)
                .expect("parse");
        assert!(!params.has_origin());
    }

    #[test]
    fn unknown_weight_function_is_rejected() {
        let result: Result<MoleParameters, _> =
            serde_json::from_str(r#"{"Tunnel": {"WeightFunction": "Magic"}}"#);
        assert!(result.is_err());
    }

    #[test]
    fn invalid_values_fail_validation() {
        let mut params = MoleParameters::default();
        params.cavity.probe_radius = -1.0;
        assert_matches!(params.validate(), Err(CoreError::Validation(msg)) if msg.contains("ProbeRadius"));

        let mut params = MoleParameters::default();
        params.tunnel.max_tunnel_similarity = 1.5;
        assert_matches!(params.validate(), Err(CoreError::Validation(_)));

        let mut params = MoleParameters::default();
        params.input.specific_chains = "A;rm -rf".to_string();
        assert_matches!(params.validate(), Err(CoreError::Validation(_)));

        let mut params = MoleParameters::default();
        params.non_active_residues.push(Residue {
            chain: " ".to_string(),
            sequence_number: 1,
        });
        assert_matches!(params.validate(), Err(CoreError::Validation(_)));
    }

    #[test]
    fn defaults_validate() {
        assert_matches!(MoleParameters::default().validate(), Ok(()));
        assert_matches!(MoleParameters::with_ignore_het(true).validate(), Ok(()));
        assert_matches!(PoresRequest::default().validate(), Ok(()));
    }

    #[test]
    fn pores_chain_list_splits_and_trims() {
        let request = PoresRequest {
            chains: "A, B,,C".to_string(),
            ..PoresRequest::default()
        };
        assert_eq!(request.chain_list(), vec!["A", "B", "C"]);
        assert!(PoresRequest::default().chain_list().is_empty());
    }

    #[test]
    fn pores_user_parameters_hide_paths() {
        let input = PoresInput {
            in_membrane: true,
            is_beta_barel: false,
            user_structure: Some("/w/x/1tqn.cif".to_string()),
            pdb_id: None,
            working_directory: "/w/x/1".to_string(),
            chains: vec!["A".to_string()],
            py_mol_location: "/opt/pymol".to_string(),
            mem_embed_location: "/opt/membed".to_string(),
            interior_threshold: 0.8,
            probe_radius: 13.0,
        };
        let json = serde_json::to_value(input.user_parameters()).expect("serialize");
        assert_eq!(
            json,
            serde_json::json!({ "InMembrane": true, "IsBetaBarel": false, "Chains": ["A"] })
        );
    }
}
