use std::{borrow::Cow, collections::HashSet, mem, ops::Range};

use anyhow::{anyhow, bail, Context, Result};
use hashlink::{LinkedHashMap, LinkedHashSet};
use log::trace;
use regex::Regex;
use rust_embed::Embed;
use typed_path::{Utf8UnixPath, Utf8UnixPathBuf};
use wgpu::{Device, ShaderModule, ShaderModuleDescriptor, ShaderSource};

/*
--------------------------------------------------------------------------------
||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||
--------------------------------------------------------------------------------
*/

/// A piece of WGSL, either inline or an embedded file
#[derive(Hash, Debug, Clone, Eq, PartialEq)]
pub enum Shader {
	Source(String),
	Path(Utf8UnixPathBuf),
}

impl Shader {
	pub fn path(path: &str) -> Self {
		Self::Path(rooted(Utf8UnixPath::new(path)))
	}

	fn parent(&self) -> Utf8UnixPathBuf {
		match self {
			Shader::Source(_) => root(),
			Shader::Path(path) => path.parent().map(|x| x.to_owned()).unwrap_or_else(root),
		}
	}

	fn source<Assets: Embed>(&self) -> Result<String> {
		match self {
			Shader::Source(source) => Ok(source.clone()),
			Shader::Path(path) => {
				let source_data = Assets::get(path.as_str())
					.ok_or_else(|| anyhow!("File not found: {}", path.as_str()))?
					.data;

				String::from_utf8(source_data.to_vec()).map_err(|_| anyhow!("Invalid UTF8 file: {}", path.as_str()))
			}
		}
	}

	fn process_source<Assets: Embed>(self, include_re: &Regex, blacklist: &mut HashSet<Shader>) -> Result<String> {
		// Check that the file wasn't already included
		if blacklist.contains(&self) {
			// Not an error, just includes empty source
			return Ok(String::new());
		}

		// Blacklist the shader from including it anymore
		blacklist.insert(self.clone());

		// The path of the current shader file
		let parent_path = self.parent();

		let mut source = self.source::<Assets>()?;

		let mut byte_offset: isize = 0;
		let mut includes = Vec::<(String, Range<usize>)>::new();

		// Find all `#include "path/to/shader.wgsl"` in the source
		for caps in include_re.captures_iter(&source) {
			let (Some(statement), Some(path)) = (caps.get(0), caps.get(1)) else {
				continue;
			};
			includes.push((path.as_str().to_owned(), statement.range()));
		}

		// Replace the include statements in the source with the actual source of each file
		for (path_str, range) in includes {
			// Offset the range by byte_offset
			let range = (range.start as isize + byte_offset) as usize..(range.end as isize + byte_offset) as usize;

			let path_absolute = rooted(&parent_path.join(path_str.as_str()));
			trace!("Including shader `{}`", path_absolute);

			// Recursively build the source of the included file
			let source_to_include = Shader::Path(path_absolute)
				.process_source::<Assets>(include_re, blacklist)
				.with_context(|| format!("While including `{path_str}`"))?;

			// Shift the remaining insertions by the size difference
			byte_offset += (source_to_include.len() as isize) - (range.len() as isize);

			source.replace_range(range, &source_to_include);
		}

		Ok(source)
	}
}

impl From<String> for Shader {
	fn from(value: String) -> Self {
		Self::Source(value)
	}
}

impl From<&str> for Shader {
	fn from(value: &str) -> Self {
		Self::Source(value.to_owned())
	}
}

fn root() -> Utf8UnixPathBuf {
	Utf8UnixPathBuf::from("/")
}

fn rooted(path: &Utf8UnixPath) -> Utf8UnixPathBuf {
	root().join(path).normalize()
}

/*
--------------------------------------------------------------------------------
||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||
--------------------------------------------------------------------------------
*/

/// Assembles a WGSL program out of embedded files and inline snippets.
///
/// Besides `#include "file.wgsl"` and `#define KEY value` directives in the sources themselves, the builder can
/// [`prepend`](Self::prepend) declarations and [`inject`](Self::inject) snippets at marker lines. The latter is how
/// a finished material shader gets extended without touching its file.
#[derive(Clone, Debug, Default)]
pub struct ShaderBuilder {
	prepend_directives: Vec<Shader>,
	include_directives: LinkedHashSet<Shader>,
	inject_directives: Vec<(String, Shader)>,
}

impl ShaderBuilder {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn include<S>(&mut self, shader: S) -> &mut Self
	where
		S: Into<Shader>,
	{
		self.include_directives.insert(shader.into());
		self
	}

	pub fn include_path(&mut self, path: &str) -> &mut Self {
		self.include(Shader::path(path))
	}

	/// Source that ends up before everything else, after injection
	pub fn prepend<S>(&mut self, shader: S) -> &mut Self
	where
		S: Into<Shader>,
	{
		self.prepend_directives.push(shader.into());
		self
	}

	/// Replaces every occurrence of `marker` with `snippet` followed by the marker itself, so that later
	/// injections at the same marker keep their order. Building fails if the marker can't be found.
	pub fn inject<K, S>(&mut self, marker: K, snippet: S) -> &mut Self
	where
		K: Into<String>,
		S: Into<Shader>,
	{
		self.inject_directives.push((marker.into(), snippet.into()));
		self
	}

	pub fn build<Assets: Embed>(&mut self, device: &Device, label: &str) -> Result<ShaderModule> {
		let source = self
			.build_source::<Assets>()
			.with_context(|| format!("Couldn't build shader `{label}`"))?;

		let shader_module = device.create_shader_module(ShaderModuleDescriptor {
			label: Some(label),
			source: ShaderSource::Wgsl(<Cow<str>>::from(source)),
		});

		Ok(shader_module)
	}

	pub fn build_source<Assets: Embed>(&mut self) -> Result<String> {
		let mut builder = mem::take(self);

		let include_re = Regex::new(r#"(?m)^#include "(.+?)"$"#)?;
		let mut include_blacklist = HashSet::new();

		let mut source = String::new();
		for shader in builder.include_directives.drain() {
			let included_source = shader.process_source::<Assets>(&include_re, &mut include_blacklist)?;
			source.push_str(&included_source);
		}

		for (marker, snippet) in builder.inject_directives.drain(..) {
			if !source.contains(&marker) {
				bail!("Injection marker `{marker}` not found");
			}

			let snippet = snippet.process_source::<Assets>(&include_re, &mut include_blacklist)?;
			source = source.replace(&marker, &format!("{snippet}\n{marker}"));
		}

		let mut prepended = String::new();
		for shader in builder.prepend_directives.drain(..) {
			prepended.push_str(&shader.process_source::<Assets>(&include_re, &mut include_blacklist)?);
			prepended.push('\n');
		}
		source.insert_str(0, &prepended);

		let define_directives = Self::process_define_directives(&mut source)?;
		Ok(Self::apply_define_directives(&define_directives, source))
	}

	fn process_define_directives(source: &mut String) -> Result<LinkedHashMap<String, String>> {
		let mut define_directives = LinkedHashMap::<String, String>::new();

		// Find all `#define KEY value` in the source
		let re = Regex::new(r#"(?m)^#define (.+?) (.+?)$"#)?;

		let mut ranges = Vec::<Range<usize>>::new();
		for caps in re.captures_iter(source) {
			let (Some(statement), Some(key), Some(value)) = (caps.get(0), caps.get(1), caps.get(2)) else {
				continue;
			};

			ranges.push(statement.range());
			define_directives.insert(key.as_str().to_owned(), value.as_str().to_owned());
		}

		// Delete the directives from the source string
		let mut offset: isize = 0;
		for range in ranges {
			let range = (range.start as isize + offset) as usize..(range.end as isize + offset) as usize;

			// Decrease offset since we're deleting sections of text
			offset -= range.len() as isize;

			source.replace_range(range, "");
		}

		Ok(define_directives)
	}

	fn apply_define_directives(define_directives: &LinkedHashMap<String, String>, mut source: String) -> String {
		let mut directives = define_directives.iter().collect::<Vec<_>>();
		// Longest keys first, so that a key that is a prefix of another doesn't clobber it
		directives.sort_by(|(key1, _), (key2, _)| key2.len().cmp(&key1.len()));

		for (key, value) in directives {
			source = source.replace(key.as_str(), value);
		}
		source
	}
}

/*
--------------------------------------------------------------------------------
||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||
--------------------------------------------------------------------------------
*/

#[cfg(test)]
mod tests {
	use super::*;
	use crate::ShaderAssets;

	#[test]
	fn defines_are_stripped_and_applied() {
		let source = ShaderBuilder::new()
			.include("#define SCALE 2.0\nlet a = SCALE;\n")
			.build_source::<ShaderAssets>()
			.unwrap();

		assert_eq!(source, "\nlet a = 2.0;\n");
	}

	#[test]
	fn longer_defines_win_over_their_prefixes() {
		let source = ShaderBuilder::new()
			.include("#define A 1\n#define AB 2\nA + AB")
			.build_source::<ShaderAssets>()
			.unwrap();

		assert_eq!(source, "\n\n1 + 2");
	}

	#[test]
	fn injection_keeps_the_marker() {
		let source = ShaderBuilder::new()
			.include("before\n// #hook\nafter")
			.inject("// #hook", "first")
			.inject("// #hook", "second")
			.build_source::<ShaderAssets>()
			.unwrap();

		assert_eq!(source, "before\nfirst\nsecond\n// #hook\nafter");
	}

	#[test]
	fn injection_without_marker_fails() {
		let result = ShaderBuilder::new()
			.include("nothing to see")
			.inject("// #hook", "snippet")
			.build_source::<ShaderAssets>();

		assert!(result.is_err());
	}

	#[test]
	fn prepend_goes_first() {
		let source = ShaderBuilder::new()
			.include("body")
			.prepend("header")
			.build_source::<ShaderAssets>()
			.unwrap();

		assert_eq!(source, "header\nbody");
	}

	#[test]
	fn includes_embedded_files_once() {
		let source = ShaderBuilder::new()
			.include("#include \"brdf.wgsl\"\n#include \"brdf.wgsl\"\n")
			.build_source::<ShaderAssets>()
			.unwrap();

		assert_eq!(source.matches("fn brdf_ggx(").count(), 1);
		assert!(!source.contains("#include"));
	}

	#[test]
	fn missing_include_fails() {
		let result = ShaderBuilder::new()
			.include("#include \"does_not_exist.wgsl\"\n")
			.build_source::<ShaderAssets>();

		assert!(result.is_err());
	}

	#[test]
	fn paths_are_rooted() {
		assert_eq!(Shader::path("physical.wgsl"), Shader::Path(Utf8UnixPathBuf::from("/physical.wgsl")));
		assert_eq!(
			Shader::path("lib/../physical.wgsl"),
			Shader::Path(Utf8UnixPathBuf::from("/physical.wgsl"))
		);
	}
}
