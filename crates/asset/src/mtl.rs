//! MTL (Wavefront material library) parser.
//!
//! Only the Phong terms a Lambert viewer needs are kept: colors, shininess,
//! opacity and the diffuse texture map.

use anyhow::{Context, Result, anyhow};

/// One `newmtl` block.
#[derive(Clone, Debug, PartialEq)]
pub struct MtlMaterial {
    pub name: String,
    /// Ka
    pub ambient: [f32; 3],
    /// Kd
    pub diffuse: [f32; 3],
    /// Ks
    pub specular: [f32; 3],
    /// Ns
    pub shininess: f32,
    /// d (or 1 - Tr)
    pub dissolve: f32,
    /// map_Kd, relative to the MTL file.
    pub diffuse_map: Option<String>,
}

impl MtlMaterial {
    fn named(name: String) -> Self {
        Self {
            name,
            ambient: [1.0, 1.0, 1.0],
            diffuse: [0.8, 0.8, 0.8],
            specular: [0.0, 0.0, 0.0],
            shininess: 0.0,
            dissolve: 1.0,
            diffuse_map: None,
        }
    }
}

/// Parse MTL contents into materials, in declaration order.
pub fn parse_mtl(contents: &str) -> Result<Vec<MtlMaterial>> {
    let mut materials = Vec::new();
    let mut current: Option<MtlMaterial> = None;

    for (line_no, line) in contents.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let mut tokens = line.split_whitespace();
        let Some(command) = tokens.next() else {
            continue;
        };

        if command == "newmtl" {
            if let Some(done) = current.take() {
                materials.push(done);
            }
            let name = tokens.collect::<Vec<_>>().join(" ");
            if name.is_empty() {
                anyhow::bail!("newmtl missing material name on line {}", line_no + 1);
            }
            current = Some(MtlMaterial::named(name));
            continue;
        }

        // Statements before the first newmtl have nothing to attach to.
        let Some(mat) = current.as_mut() else {
            continue;
        };

        match command {
            "Ka" => mat.ambient = parse_rgb(&mut tokens, line_no, command)?,
            "Kd" => mat.diffuse = parse_rgb(&mut tokens, line_no, command)?,
            "Ks" => mat.specular = parse_rgb(&mut tokens, line_no, command)?,
            "Ns" => mat.shininess = parse_f32(tokens.next(), line_no, command)?,
            "d" => mat.dissolve = parse_f32(tokens.next(), line_no, command)?,
            "Tr" => mat.dissolve = 1.0 - parse_f32(tokens.next(), line_no, command)?,
            "map_Kd" => {
                let path = map_path(tokens)
                    .ok_or_else(|| anyhow!("map_Kd missing path on line {}", line_no + 1))?;
                mat.diffuse_map = Some(path.replace('\\', "/"));
            }
            _ => {}
        }
    }

    if let Some(done) = current {
        materials.push(done);
    }
    Ok(materials)
}

/// File name of a texture map statement: everything after the leading
/// options (`-s 1 1 1`, `-clamp on`, ...), so names may contain spaces.
fn map_path<'a, I>(tokens: I) -> Option<String>
where
    I: Iterator<Item = &'a str>,
{
    let mut tokens = tokens.peekable();
    while tokens.next_if(|t| t.starts_with('-')).is_some() {
        // Option arguments are numbers or on/off switches.
        while tokens
            .next_if(|t| t.parse::<f32>().is_ok() || *t == "on" || *t == "off")
            .is_some()
        {}
    }
    let rest = tokens.collect::<Vec<_>>().join(" ");
    (!rest.is_empty()).then_some(rest)
}

fn parse_rgb<'a, I>(tokens: &mut I, line_no: usize, what: &str) -> Result<[f32; 3]>
where
    I: Iterator<Item = &'a str>,
{
    let r = parse_f32(tokens.next(), line_no, what)?;
    // A single value means grey.
    let g = match tokens.next() {
        Some(t) => parse_f32(Some(t), line_no, what)?,
        None => return Ok([r, r, r]),
    };
    let b = parse_f32(tokens.next(), line_no, what)?;
    Ok([r, g, b])
}

fn parse_f32(value: Option<&str>, line_no: usize, what: &str) -> Result<f32> {
    let token = value.ok_or_else(|| anyhow!("Missing {} value on line {}", what, line_no + 1))?;
    token
        .parse::<f32>()
        .with_context(|| format!("Failed to parse {} on line {}", what, line_no + 1))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_materials_in_order() {
        let src = r#"
            # exported
            newmtl skin
            Ka 0.2 0.2 0.2
            Kd 0.9 0.7 0.6
            Ns 10
            map_Kd -s 1 1 1 01_-_Default1noCulling.JPG

            newmtl cloth
            Kd 0.5
            Tr 0.25
        "#;
        let mats = parse_mtl(src).unwrap();
        assert_eq!(mats.len(), 2);
        assert_eq!(mats[0].name, "skin");
        assert_eq!(mats[0].diffuse, [0.9, 0.7, 0.6]);
        assert_eq!(mats[0].diffuse_map.as_deref(), Some("01_-_Default1noCulling.JPG"));
        assert_eq!(mats[1].diffuse, [0.5, 0.5, 0.5]);
        assert!((mats[1].dissolve - 0.75).abs() < 1e-6);
        assert!(mats[1].diffuse_map.is_none());
    }

    #[test]
    fn map_path_keeps_spaces_after_options() {
        let src = "newmtl a\nmap_Kd my texture.png\nnewmtl b\nmap_Kd -clamp on -o 0 0.5 textures\\old wood.jpg\n";
        let mats = parse_mtl(src).unwrap();
        assert_eq!(mats[0].diffuse_map.as_deref(), Some("my texture.png"));
        assert_eq!(mats[1].diffuse_map.as_deref(), Some("textures/old wood.jpg"));
        assert!(parse_mtl("newmtl a\nmap_Kd -s 1 1 1\n").is_err());
    }

    #[test]
    fn rejects_bad_numbers() {
        assert!(parse_mtl("newmtl a\nKd 1 x 1\n").is_err());
        assert!(parse_mtl("newmtl\n").is_err());
    }
}
