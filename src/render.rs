//! Renders a static Go `map[string]float64` literal from instance type prices.
//!
//! Entries are sorted and grouped by instance family so that regenerating the
//! table only touches the families whose prices actually moved.

use failure::Fail;

/// Soft line width; checked after each entry is written.
const WRAP_AT: usize = 80;

#[derive(Debug, Fail, Clone, PartialEq, Eq)]
#[fail(display = "parsing instance family {}, got {:?}", identifier, segments)]
pub struct MalformedIdentifier {
    pub identifier: String,
    pub segments: Vec<String>,
}

/// Splits `family.size`, rejecting anything that is not exactly two segments.
pub fn instance_family(identifier: &str) -> Result<&str, MalformedIdentifier> {
    let segments: Vec<&str> = identifier.split('.').collect();
    match segments.as_slice() {
        [family, _size] => Ok(*family),
        _ => Err(MalformedIdentifier {
            identifier: identifier.to_string(),
            segments: segments.iter().map(|s| s.to_string()).collect(),
        }),
    }
}

/// Renders `var <var_name> = map[string]float64{...}` for the given instance types.
///
/// Instance types whose `lookup` misses are left out of the table.
pub fn render<I, S, F>(
    instance_types: I,
    var_name: &str,
    lookup: F,
) -> Result<String, MalformedIdentifier>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
    F: Fn(&str) -> Option<f64>,
{
    let mut src = String::new();
    write_pricing(&mut src, instance_types, var_name, lookup)?;
    Ok(src)
}

/// Appends the pricing map to `src` and returns the number of entries written.
///
/// On error the contents of `src` are unspecified and should be discarded.
pub fn write_pricing<I, S, F>(
    src: &mut String,
    instance_types: I,
    var_name: &str,
    lookup: F,
) -> Result<usize, MalformedIdentifier>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
    F: Fn(&str) -> Option<f64>,
{
    let mut names: Vec<String> = instance_types
        .into_iter()
        .map(|name| name.as_ref().to_string())
        .collect();
    names.sort();

    src.push_str(&format!("var {} = map[string]float64{{\n", var_name));

    let mut line_len = 0;
    let mut entries = 0;
    let mut previous_family: Option<&str> = None;
    for name in &names {
        let family = instance_family(name)?;
        let price = match lookup(name) {
            Some(price) => price,
            None => continue,
        };

        // a break per family keeps regeneration diffs local to the family that changed
        if previous_family != Some(family) {
            previous_family = Some(family);
            newline(src);
            src.push_str(&format!("// {} family\n", family));
            line_len = 0;
        }

        let entry = format!("\"{}\":{:.6}, ", name, price);
        src.push_str(&entry);
        entries += 1;
        line_len += entry.len();
        if line_len > WRAP_AT {
            line_len = 0;
            src.push('\n');
        }
    }
    src.push_str("\n}\n");
    src.push('\n');
    Ok(entries)
}

/// Ends `src` with a newline unless it is empty or already ends with one.
fn newline(src: &mut String) {
    if !src.is_empty() && !src.ends_with('\n') {
        src.push('\n');
    }
}
