//! Tool input artifacts.
//!
//! The channel tool reads an XML document (`input.xml`); the pore tool reads
//! a flat JSON parameter file (`pores.json`). Builders here are pure: they
//! take resolved paths and return the document, and the manager writes it.

use std::path::Path;

use crate::params::{MoleParameters, Origin, PoresInput, PoresRequest, Residue};
use crate::xml::Element;

/// Paths the channel tool input refers to.
pub struct MoleLayout<'a> {
    pub structure: &'a Path,
    pub working_directory: &'a Path,
}

/// Build the XML input for a full channel computation.
pub fn mole_input(layout: &MoleLayout<'_>, params: &MoleParameters) -> Element {
    let has_origin = params.has_origin();
    let has_exits = params.has_custom_exits();
    let structure_name = structure_stem(layout.structure);

    let input = Element::new("Input")
        .attr("SpecificChains", &params.input.specific_chains)
        .flag("ReadAllModels", params.input.read_all_models)
        .text(layout.structure.display().to_string());

    let mut non_active = Element::new("NonActiveParts");
    if !params.non_active_residues.is_empty() {
        non_active = non_active.children(residue_elements(&params.non_active_residues));
    }
    if !params.query_filter.is_empty() {
        non_active.push(Element::new("Query").text(&params.query_filter));
    }

    let tunnel = &params.tunnel;
    let settings = Element::new("Params")
        .child(cavity_element(params))
        .child(
            Element::new("Tunnel")
                .attr("BottleneckRadius", tunnel.bottleneck_radius)
                .attr("BottleneckTolerance", tunnel.bottleneck_tolerance)
                .attr("MaxTunnelSimilarity", tunnel.max_tunnel_similarity)
                .attr("OriginRadius", tunnel.origin_radius)
                .attr("SurfaceCoverRadius", tunnel.surface_cover_radius)
                .attr("WeightFunction", tunnel.weight_function.as_str())
                .flag("UseCustomExitsOnly", has_origin && has_exits),
        );

    let export = Element::new("Export")
        .child(formats_element(true))
        .child(
            Element::new("Types")
                .flag("Cavities", false)
                .flag("Tunnels", has_origin || !has_exits)
                .flag("PoresAuto", params.pores_auto)
                .flag("PoresMerged", params.pores_merged)
                .flag("PoresUser", !has_origin && has_exits),
        )
        .children(
            ["PyMol", "VMD", "Chimera"].map(|viewer| {
                Element::new(viewer)
                    .attr("PDBId", &structure_name)
                    .attr("SurfaceType", "Spheres")
            }),
        );

    let mut root = Element::new("Tunnels")
        .child(input)
        .child(working_directory(layout.working_directory))
        .child(non_active)
        .child(settings)
        .child(export)
        .child(origin_element(params.origin.as_ref(), "Origin", "Origin"));

    if has_exits {
        root.push(origin_element(
            params.custom_exits.as_ref(),
            "CustomExit",
            "Exit",
        ));
    }
    root
}

/// Build the XML input for the preparation run in `{job}/0`.
///
/// Only the JSON export is enabled; the run normalizes the structure and
/// surfaces parse errors before any real submission.
pub fn preparation_input(structure: &Path, working_dir: &Path) -> Element {
    let defaults = MoleParameters::default();

    Element::new("Tunnels")
        .child(Element::new("Input").text(structure.display().to_string()))
        .child(working_directory(working_dir))
        .child(Element::new("Params").child(cavity_element(&defaults)))
        .child(
            Element::new("Export").child(formats_element(false)).child(
                Element::new("Types")
                    .flag("Cavities", false)
                    .flag("Tunnels", false)
                    .flag("PoresAuto", defaults.pores_auto)
                    .flag("PoresMerged", defaults.pores_merged)
                    .flag("PoresUser", defaults.has_custom_exits()),
            ),
        )
        .child(Element::new("Origins").flag("Auto", false))
}

/// Where the pore tool gets its structure from.
pub enum PoresStructure<'a> {
    /// Database mode: the tool resolves the structure by identifier.
    Database { structure_id: &'a str },
    /// A structure file in the job directory.
    File(&'a Path),
}

/// Tool locations injected into every pore tool input.
pub struct PoresTools<'a> {
    pub pymol: &'a str,
    pub membed: &'a str,
}

pub fn pores_input(
    request: &PoresRequest,
    structure: PoresStructure<'_>,
    working_dir: &Path,
    tools: &PoresTools<'_>,
) -> PoresInput {
    let (user_structure, pdb_id) = match structure {
        PoresStructure::Database { structure_id } => (None, Some(structure_id.to_string())),
        PoresStructure::File(path) => (Some(path.display().to_string()), None),
    };

    PoresInput {
        in_membrane: request.in_membrane,
        is_beta_barel: request.is_beta_barel,
        user_structure,
        pdb_id,
        working_directory: working_dir.display().to_string(),
        chains: request.chain_list(),
        py_mol_location: tools.pymol.to_string(),
        mem_embed_location: tools.membed.to_string(),
        interior_threshold: request.interior_threshold,
        probe_radius: request.probe_radius,
    }
}

fn structure_stem(structure: &Path) -> String {
    structure
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn working_directory(dir: &Path) -> Element {
    Element::new("WorkingDirectory").text(dir.display().to_string())
}

fn cavity_element(params: &MoleParameters) -> Element {
    let cavity = &params.cavity;
    Element::new("Cavity")
        .attr("ProbeRadius", cavity.probe_radius)
        .attr("InteriorThreshold", cavity.interior_threshold)
        .flag("IgnoreHETAtoms", cavity.ignore_het_atoms)
        .flag("IgnoreHydrogens", cavity.ignore_hydrogens)
}

fn formats_element(full: bool) -> Element {
    Element::new("Formats")
        .flag("ChargeSurface", false)
        .flag("PyMol", full)
        .flag("PDBProfile", full)
        .flag("VMD", full)
        .flag("Chimera", full)
        .flag("CSV", full)
        .flag("JSON", true)
}

/// `{key}s` element with one `{sub_key}` child per point, residue group and
/// query; `Auto="1"` when there is nothing to list.
fn origin_element(origin: Option<&Origin>, key: &str, sub_key: &str) -> Element {
    let name = format!("{key}s");
    let Some(origin) = origin.filter(|o| !o.is_empty()) else {
        return Element::new(name).flag("Auto", true);
    };

    let points = origin.points.iter().map(|p| {
        Element::new(sub_key).child(
            Element::new("Point")
                .attr("X", p.x)
                .attr("Y", p.y)
                .attr("Z", p.z),
        )
    });
    let residues = origin
        .residues
        .iter()
        .map(|group| Element::new(sub_key).children(residue_elements(group)));
    let query = (!origin.query_expression.is_empty())
        .then(|| Element::new(sub_key).child(Element::new("Query").text(&origin.query_expression)));

    Element::new(name)
        .children(points)
        .children(residues)
        .children(query)
}

fn residue_elements(residues: &[Residue]) -> Vec<Element> {
    residues
        .iter()
        .map(|r| {
            Element::new("Residue")
                .attr("SequenceNumber", r.sequence_number)
                .attr("Chain", &r.chain)
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;
    use crate::params::Point3D;

    fn layout_paths() -> (PathBuf, PathBuf) {
        (PathBuf::from("/w/abc/1tqn.cif"), PathBuf::from("/w/abc/2"))
    }

    fn build(params: &MoleParameters) -> Element {
        let (structure, wd) = layout_paths();
        mole_input(
            &MoleLayout {
                structure: &structure,
                working_directory: &wd,
            },
            params,
        )
    }

    fn types(root: &Element) -> &Element {
        root.find("Export")
            .and_then(|e| e.find("Types"))
            .expect("Types element")
    }

    #[test]
    fn default_parameters_use_automatic_origins() {
        let root = build(&MoleParameters::default());

        assert_eq!(root.name(), "Tunnels");
        let input = root.find("Input").expect("Input");
        assert_eq!(input.text_content(), Some("/w/abc/1tqn.cif"));
        assert_eq!(input.attribute("ReadAllModels"), Some("0"));
        assert_eq!(
            root.find("WorkingDirectory").and_then(|e| e.text_content()),
            Some("/w/abc/2")
        );
        assert_eq!(
            root.find("Origins").and_then(|e| e.attribute("Auto")),
            Some("1")
        );
        assert!(root.find("CustomExits").is_none());
        assert_eq!(types(&root).attribute("Tunnels"), Some("1"));
        assert_eq!(types(&root).attribute("PoresUser"), Some("0"));
    }

    #[test]
    fn viewers_are_named_after_the_structure() {
        let root = build(&MoleParameters::default());
        let export = root.find("Export").expect("Export");
        for viewer in ["PyMol", "VMD", "Chimera"] {
            let el = export.find(viewer).expect("viewer element");
            assert_eq!(el.attribute("PDBId"), Some("1tqn"));
            assert_eq!(el.attribute("SurfaceType"), Some("Spheres"));
        }
    }

    #[test]
    fn exits_without_origin_compute_user_pores() {
        let mut params = MoleParameters::default();
        params.custom_exits = Some(Origin {
            query_expression: "Residues('HEM')".to_string(),
            ..Origin::default()
        });
        let root = build(&params);

        assert_eq!(types(&root).attribute("Tunnels"), Some("0"));
        assert_eq!(types(&root).attribute("PoresUser"), Some("1"));
        let tunnel = root
            .find("Params")
            .and_then(|p| p.find("Tunnel"))
            .expect("Tunnel");
        assert_eq!(tunnel.attribute("UseCustomExitsOnly"), Some("0"));

        let exits = root.find("CustomExits").expect("CustomExits");
        let exit = &exits.child_elements()[0];
        assert_eq!(exit.name(), "Exit");
        assert_eq!(
            exit.find("Query").and_then(|q| q.text_content()),
            Some("Residues('HEM')")
        );
    }

    #[test]
    fn origin_and_exits_restrict_to_custom_exits() {
        let mut params = MoleParameters::default();
        params.origin = Some(Origin {
            points: vec![Point3D {
                x: 1.0,
                y: 2.5,
                z: -3.0,
            }],
            ..Origin::default()
        });
        params.custom_exits = Some(Origin {
            residues: vec![vec![Residue {
                chain: "A".to_string(),
                sequence_number: 42,
            }]],
            ..Origin::default()
        });
        let root = build(&params);

        let tunnel = root
            .find("Params")
            .and_then(|p| p.find("Tunnel"))
            .expect("Tunnel");
        assert_eq!(tunnel.attribute("UseCustomExitsOnly"), Some("1"));
        assert_eq!(types(&root).attribute("Tunnels"), Some("1"));

        let origins = root.find("Origins").expect("Origins");
        assert_eq!(origins.attribute("Auto"), None);
        let point = origins.child_elements()[0].find("Point").expect("Point");
        assert_eq!(point.attribute("Y"), Some("2.5"));
        assert_eq!(point.attribute("Z"), Some("-3"));

        let residue = root.find("CustomExits").expect("CustomExits").child_elements()[0]
            .find("Residue")
            .expect("Residue");
        assert_eq!(residue.attribute("SequenceNumber"), Some("42"));
        assert_eq!(residue.attribute("Chain"), Some("A"));
    }

    #[test]
    fn non_active_parts_list_residues_and_query() {
        let mut params = MoleParameters::default();
        params.non_active_residues = vec![Residue {
            chain: "B".to_string(),
            sequence_number: 7,
        }];
        params.query_filter = "Atoms('Fe')".to_string();
        let root = build(&params);

        let parts = root.find("NonActiveParts").expect("NonActiveParts");
        let names: Vec<&str> = parts.child_elements().iter().map(Element::name).collect();
        assert_eq!(names, vec!["Residue", "Query"]);
    }

    #[test]
    fn preparation_run_exports_json_only() {
        let root = preparation_input(Path::new("/w/abc/1tqn.cif"), Path::new("/w/abc/0"));
        let formats = root
            .find("Export")
            .and_then(|e| e.find("Formats"))
            .expect("Formats");
        assert_eq!(formats.attribute("JSON"), Some("1"));
        for off in ["ChargeSurface", "PyMol", "PDBProfile", "VMD", "Chimera", "CSV"] {
            assert_eq!(formats.attribute(off), Some("0"), "{off}");
        }
        assert_eq!(
            root.find("Origins").and_then(|e| e.attribute("Auto")),
            Some("0")
        );
        assert!(root.find("Params").and_then(|p| p.find("Tunnel")).is_none());
        assert!(root.to_document().starts_with("<?xml"));
    }

    #[test]
    fn pores_database_mode_uses_identifier() {
        let request = PoresRequest {
            chains: "A,B".to_string(),
            ..PoresRequest::default()
        };
        let tools = PoresTools {
            pymol: "/opt/pymol",
            membed: "/opt/membed",
        };
        let input = pores_input(
            &request,
            PoresStructure::Database {
                structure_id: "1tqn",
            },
            Path::new("/w/abc/1"),
            &tools,
        );
        assert_eq!(input.pdb_id.as_deref(), Some("1tqn"));
        assert!(input.user_structure.is_none());
        assert_eq!(input.chains, vec!["A", "B"]);
        assert_eq!(input.working_directory, "/w/abc/1");

        let file = pores_input(
            &request,
            PoresStructure::File(Path::new("/w/abc/1tqn.cif")),
            Path::new("/w/abc/1"),
            &tools,
        );
        assert_eq!(file.user_structure.as_deref(), Some("/w/abc/1tqn.cif"));
        assert!(file.pdb_id.is_none());
    }
}
