use proc_macro::TokenStream;
use quote::quote;
use syn::{parse_macro_input, Data::Struct, DeriveInput, Fields};

/*
--------------------------------------------------------------------------------
||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||
--------------------------------------------------------------------------------
*/

/// Implements `ShaderType` for a `#[repr(C)]` struct, so that its WGSL declaration can be generated from the Rust
/// definition and prepended to the shaders that bind it.
#[proc_macro_derive(ShaderStruct)]
pub fn shader_struct_derive(input: TokenStream) -> TokenStream {
	let input = parse_macro_input!(input as DeriveInput);

	let name = input.ident;

	let fields = match input.data {
		Struct(s) => match s.fields {
			Fields::Named(fields) => fields.named,
			_ => {
				return syn::Error::new_spanned(name, "ShaderStruct needs named fields")
					.to_compile_error()
					.into()
			}
		},
		_ => {
			return syn::Error::new_spanned(name, "ShaderStruct can only be derived for structs")
				.to_compile_error()
				.into()
		}
	};

	let fields = fields.into_iter().filter_map(|f| {
		let field_name = f.ident?;
		let field_type = f.ty;

		Some(quote!(
			format!(
				"{}: {}",
				stringify!(#field_name),
				<#field_type as crate::core::buffer::ShaderType>::type_name()
			)
		))
	});

	let out = quote! {
		impl crate::core::buffer::ShaderType for #name {
			fn type_name() -> String {
				stringify!(#name).to_string()
			}

			fn struct_definition() -> Option<String> {
				let fields: Vec<String> = vec![#(#fields),*];
				Some(format!(
					"struct {} {{\n\t{},\n}}\n",
					stringify!(#name),
					fields.join(",\n\t")
				))
			}
		}
	};

	out.into()
}
