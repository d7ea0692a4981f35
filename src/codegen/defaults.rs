//! Field default values
//!
//! Handles explicit `[default = ...]` values: the encoded form written into
//! wire tags, the typed `Default_<Message>_<Field>` holder constants, and the
//! fallback expressions getters return when a field is unset.

use super::{ident, Context};
use crate::model::{Cardinality, Field, Kind, Message};
use crate::GeneratorError;
use proc_macro2::{Literal, TokenStream};
use quote::{format_ident, quote};

/// Classification of a floating point default
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FloatDefault {
    /// Negative infinity
    NegInf,
    /// Positive infinity
    Inf,
    /// Not a number
    NaN,
    /// Any finite value
    Finite(f64),
}

impl FloatDefault {
    /// Parse a declared float default; protoc writes `inf`, `-inf` and `nan`
    pub fn parse(text: &str) -> Option<Self> {
        let value: f64 = text.trim().parse().ok()?;
        Some(if value.is_nan() {
            FloatDefault::NaN
        } else if value == f64::INFINITY {
            FloatDefault::Inf
        } else if value == f64::NEG_INFINITY {
            FloatDefault::NegInf
        } else {
            FloatDefault::Finite(value)
        })
    }
}

/// Whether a field has a default worth a holder constant
///
/// An empty string or bytes default counts as no default at all.
pub fn has_nontrivial_default(field: &Field) -> bool {
    if field.cardinality == Cardinality::Repeated {
        return false;
    }
    match (&field.default_value, &field.kind) {
        (None, _) => false,
        (Some(value), Kind::String | Kind::Bytes) => !value.is_empty(),
        (Some(_), _) => true,
    }
}

/// The `def=` value of a wire tag, if any
///
/// Tags are strings, so a bytes default must unescape to valid UTF-8.
pub fn encoded_default(field: &Field) -> Result<Option<String>, GeneratorError> {
    let Some(value) = field.default_value.as_deref().filter(|_| has_nontrivial_default(field))
    else {
        return Ok(None);
    };
    let encoded = match &field.kind {
        Kind::Bool => if value == "true" { "1" } else { "0" }.to_string(),
        Kind::Bytes => String::from_utf8(unescape_bytes(value)).map_err(|_| {
            GeneratorError::CodeGenError(format!(
                "bytes default of field {} is not valid UTF-8 and cannot be carried in a tag",
                field.name
            ))
        })?,
        Kind::Float | Kind::Double => match FloatDefault::parse(value) {
            Some(FloatDefault::NegInf) => "-inf".to_string(),
            Some(FloatDefault::Inf) => "inf".to_string(),
            Some(FloatDefault::NaN) => "nan".to_string(),
            Some(FloatDefault::Finite(v)) => format_float(v, matches!(field.kind, Kind::Float)),
            None => value.to_string(),
        },
        Kind::Enum(e) => e
            .number_of(value)
            .map_or_else(|| value.to_string(), |n| n.to_string()),
        _ => value.to_string(),
    };
    Ok(Some(encoded))
}

/// Shortest `%g` rendering: exponent form below 1e-4 and from 1e6 up
fn format_float(value: f64, single: bool) -> String {
    let (plain, sci) = if single {
        let narrowed = value as f32;
        (narrowed.to_string(), format!("{:e}", narrowed))
    } else {
        (value.to_string(), format!("{:e}", value))
    };
    let Some((mantissa, exp)) = sci.split_once('e') else {
        return plain;
    };
    let exp: i32 = exp.parse().unwrap_or(0);
    if (-4..6).contains(&exp) {
        plain
    } else {
        let sign = if exp < 0 { '-' } else { '+' };
        format!("{}e{}{:02}", mantissa, sign, exp.abs())
    }
}

/// Decode a C-escaped bytes default as protoc writes it
pub fn unescape_bytes(text: &str) -> Vec<u8> {
    let bytes = text.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] != b'\\' || i + 1 == bytes.len() {
            out.push(bytes[i]);
            i += 1;
            continue;
        }
        i += 1;
        match bytes[i] {
            b'n' => out.push(b'\n'),
            b'r' => out.push(b'\r'),
            b't' => out.push(b'\t'),
            b'a' => out.push(0x07),
            b'b' => out.push(0x08),
            b'f' => out.push(0x0c),
            b'v' => out.push(0x0b),
            b'x' | b'X' => {
                let digits = take_digits(&bytes[i + 1..], 2, 16);
                if digits.is_empty() {
                    out.push(bytes[i]);
                } else {
                    out.push(digit_value(digits, 16));
                    i += digits.len();
                }
            }
            b'0'..=b'7' => {
                let digits = take_digits(&bytes[i..], 3, 8);
                out.push(digit_value(digits, 8));
                i += digits.len() - 1;
            }
            other => out.push(other),
        }
        i += 1;
    }
    out
}

fn take_digits(bytes: &[u8], max: usize, radix: u32) -> &[u8] {
    let len = bytes
        .iter()
        .take(max)
        .take_while(|b| (**b as char).is_digit(radix))
        .count();
    &bytes[..len]
}

fn digit_value(digits: &[u8], radix: u32) -> u8 {
    digits.iter().fold(0u32, |acc, b| {
        acc * radix + (*b as char).to_digit(radix).unwrap_or(0)
    }) as u8
}

/// Name of the holder constant for a field's default
pub fn holder_name(message: &Message, field: &Field) -> syn::Ident {
    format_ident!("Default_{}_{}", message.ident.name, field.camel_name)
}

/// Emit the holder constant for a field with a non-trivial default
pub fn generate_holder(
    ctx: &Context<'_>,
    message: &Message,
    field: &Field,
) -> Result<TokenStream, GeneratorError> {
    let Some(value) = field.default_value.as_deref().filter(|_| has_nontrivial_default(field))
    else {
        return Ok(TokenStream::new());
    };
    let name = holder_name(message, field);
    let invalid = || {
        GeneratorError::CodeGenError(format!(
            "invalid default `{}` for field {}.{}",
            value, message.full_name, field.name
        ))
    };

    let (ty, expr) = match &field.kind {
        Kind::String => {
            let lit = Literal::string(value);
            (quote!(&str), quote!(#lit))
        }
        Kind::Bytes => {
            let lit = Literal::byte_string(&unescape_bytes(value));
            (quote!(&[u8]), quote!(#lit))
        }
        Kind::Enum(e) => {
            e.number_of(value).ok_or_else(invalid)?;
            let ty = ctx.native_type(&e.ident)?;
            let variant = ident(value);
            (quote!(#ty), quote!(#ty::#variant))
        }
        Kind::Bool => {
            let lit = match value {
                "true" => true,
                "false" => false,
                _ => return Err(invalid()),
            };
            (quote!(bool), quote!(#lit))
        }
        Kind::Float => (quote!(f32), float_expr(value, true).ok_or_else(invalid)?),
        Kind::Double => (quote!(f64), float_expr(value, false).ok_or_else(invalid)?),
        Kind::Int32 | Kind::Sint32 | Kind::Sfixed32 => {
            (quote!(i32), int_expr::<i32>(value, "i32").ok_or_else(invalid)?)
        }
        Kind::Int64 | Kind::Sint64 | Kind::Sfixed64 => {
            (quote!(i64), int_expr::<i64>(value, "i64").ok_or_else(invalid)?)
        }
        Kind::Uint32 | Kind::Fixed32 => {
            (quote!(u32), int_expr::<u32>(value, "u32").ok_or_else(invalid)?)
        }
        Kind::Uint64 | Kind::Fixed64 => {
            (quote!(u64), int_expr::<u64>(value, "u64").ok_or_else(invalid)?)
        }
        Kind::Message(_) | Kind::Group(_) => return Err(invalid()),
    };

    Ok(quote! {
        #[allow(non_upper_case_globals)]
        pub const #name: #ty = #expr;
    })
}

/// Typed integer literal, negated through the unary operator
fn int_expr<T>(text: &str, suffix: &str) -> Option<TokenStream>
where
    T: std::str::FromStr + std::fmt::Display,
{
    let value: T = text.trim().parse().ok()?;
    let expr: syn::Expr = syn::parse_str(&format!("{}{}", value, suffix)).ok()?;
    Some(quote!(#expr))
}

/// Float default expression; non-finite values go through the `f64` constants
fn float_expr(text: &str, single: bool) -> Option<TokenStream> {
    let special = match FloatDefault::parse(text)? {
        FloatDefault::NegInf => quote!(f64::NEG_INFINITY),
        FloatDefault::Inf => quote!(f64::INFINITY),
        FloatDefault::NaN => quote!(f64::NAN),
        FloatDefault::Finite(value) => {
            let source = if single {
                let narrowed = value as f32;
                if !narrowed.is_finite() {
                    return None;
                }
                format!("{:?}f32", narrowed)
            } else {
                format!("{:?}f64", value)
            };
            let expr: syn::Expr = syn::parse_str(&source).ok()?;
            return Some(quote!(#expr));
        }
    };
    Some(if single {
        quote!(#special as f32)
    } else {
        special
    })
}

/// Value a getter returns for an unset singular field
pub fn getter_fallback(
    ctx: &Context<'_>,
    message: &Message,
    field: &Field,
) -> Result<TokenStream, GeneratorError> {
    if has_nontrivial_default(field) {
        let name = holder_name(message, field);
        return Ok(quote!(#name));
    }
    Ok(match &field.kind {
        Kind::Bool => quote!(false),
        Kind::String => quote!(""),
        Kind::Bytes => quote!(&[]),
        Kind::Message(_) | Kind::Group(_) => quote!(None),
        Kind::Float | Kind::Double => quote!(0.0),
        Kind::Enum(e) => {
            let ty = ctx.native_type(&e.ident)?;
            match e.first_value() {
                Some(first) => {
                    let first = ident(first);
                    quote!(#ty::#first)
                }
                None => quote!(#ty(0)),
            }
        }
        _ => quote!(0),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codegen::tests::{context, empty_file, pretty};
    use crate::model::{FileSet, NativeIdent, Syntax};
    use crate::types::tests::{color_ref, scalar};

    fn item(fields: Vec<Field>) -> Message {
        Message {
            name: "Item".to_string(),
            full_name: "test.Item".to_string(),
            ident: NativeIdent::new("Item", "crate::test"),
            fields,
            oneofs: Vec::new(),
            messages: Vec::new(),
            enums: Vec::new(),
            extensions: Vec::new(),
            extension_ranges: Vec::new(),
            deprecated: false,
            message_set_wire_format: false,
            map_entry: false,
            path: vec![4, 0],
        }
    }

    fn holder(field: Field) -> Result<String, GeneratorError> {
        let file = empty_file(Syntax::Proto2);
        let files = FileSet::default();
        let ctx = context(&file, &files);
        let message = item(vec![field.clone()]);
        generate_holder(&ctx, &message, &field).map(pretty)
    }

    #[test]
    fn test_empty_string_default_is_trivial() {
        let mut field = scalar("name", 1, Kind::String, Syntax::Proto2);
        field.default_value = Some(String::new());
        assert!(!has_nontrivial_default(&field));
        field.default_value = Some("x".to_string());
        assert!(has_nontrivial_default(&field));
    }

    #[test]
    fn test_empty_numeric_default_is_still_a_default() {
        let mut field = scalar("n", 1, Kind::Int32, Syntax::Proto2);
        field.default_value = Some("0".to_string());
        assert!(has_nontrivial_default(&field));
    }

    #[test]
    fn test_repeated_fields_have_no_default() {
        let mut field = scalar("n", 1, Kind::Int32, Syntax::Proto2);
        field.cardinality = Cardinality::Repeated;
        field.default_value = Some("3".to_string());
        assert!(!has_nontrivial_default(&field));
        assert_eq!(encoded_default(&field).unwrap(), None);
    }

    #[test]
    fn test_float_default_classification() {
        assert_eq!(FloatDefault::parse("inf"), Some(FloatDefault::Inf));
        assert_eq!(FloatDefault::parse("-inf"), Some(FloatDefault::NegInf));
        assert_eq!(FloatDefault::parse("nan"), Some(FloatDefault::NaN));
        assert_eq!(FloatDefault::parse("2.5"), Some(FloatDefault::Finite(2.5)));
        assert_eq!(FloatDefault::parse("abc"), None);
    }

    #[test]
    fn test_unescape_bytes() {
        assert_eq!(unescape_bytes("abc"), b"abc".to_vec());
        assert_eq!(unescape_bytes("a\\nb"), b"a\nb".to_vec());
        assert_eq!(unescape_bytes("\\001\\377"), vec![1, 255]);
        assert_eq!(unescape_bytes("\\x41\\\\"), b"A\\".to_vec());
        assert_eq!(unescape_bytes("\\0"), vec![0]);
        assert_eq!(unescape_bytes("\\\"q\\'"), b"\"q'".to_vec());
    }

    #[test]
    fn test_encoded_enum_default_is_number() {
        let mut field = scalar("color", 1, Kind::Enum(color_ref()), Syntax::Proto2);
        field.default_value = Some("BLUE".to_string());
        assert_eq!(encoded_default(&field).unwrap(), Some("1".to_string()));
    }

    #[test]
    fn test_special_floats_use_constants() {
        let expr = float_expr("-inf", true).unwrap().to_string();
        assert_eq!(expr, "f64 :: NEG_INFINITY as f32");
        let expr = float_expr("inf", false).unwrap().to_string();
        assert_eq!(expr, "f64 :: INFINITY");
        let expr = float_expr("nan", false).unwrap().to_string();
        assert_eq!(expr, "f64 :: NAN");
        let expr = float_expr("nan", true).unwrap().to_string();
        assert_eq!(expr, "f64 :: NAN as f32");
    }

    #[test]
    fn test_finite_floats_are_typed_literals() {
        assert_eq!(float_expr("1.5", true).unwrap().to_string(), "1.5f32");
        assert_eq!(float_expr("3", false).unwrap().to_string(), "3.0f64");
        assert_eq!(float_expr("-0.25", false).unwrap().to_string(), "- 0.25f64");
        assert!(float_expr("1e300", true).is_none());
    }

    #[test]
    fn test_int_literals_are_typed() {
        assert_eq!(int_expr::<i32>("-7", "i32").unwrap().to_string(), "- 7i32");
        assert_eq!(int_expr::<u64>("18446744073709551615", "u64").unwrap().to_string(), "18446744073709551615u64");
        assert!(int_expr::<u32>("-1", "u32").is_none());
    }

    #[test]
    fn test_local_enum_holder() {
        let mut field = scalar("color", 1, Kind::Enum(color_ref()), Syntax::Proto2);
        field.default_value = Some("GREEN".to_string());
        let out = holder(field).unwrap();
        assert!(out.contains("#[allow(non_upper_case_globals)]"));
        assert!(out.contains("pub const Default_Item_Color: Color = Color::GREEN;"));
    }

    #[test]
    fn test_foreign_enum_holder_is_qualified() {
        let mut color = color_ref();
        color.ident = NativeIdent::new("Color", "crate::other");
        let mut field = scalar("color", 1, Kind::Enum(color), Syntax::Proto2);
        field.default_value = Some("BLUE".to_string());
        let out = holder(field).unwrap();
        assert!(out.contains(
            "pub const Default_Item_Color: crate::other::Color = crate::other::Color::BLUE;"
        ));
    }

    #[test]
    fn test_unknown_enum_default_is_rejected() {
        let mut field = scalar("color", 1, Kind::Enum(color_ref()), Syntax::Proto2);
        field.default_value = Some("PURPLE".to_string());
        let err = holder(field).unwrap_err();
        assert!(matches!(err, GeneratorError::CodeGenError(ref msg) if msg.contains("PURPLE")));
    }

    #[test]
    fn test_bool_holder() {
        let mut field = scalar("flag", 1, Kind::Bool, Syntax::Proto2);
        field.default_value = Some("true".to_string());
        let out = holder(field.clone()).unwrap();
        assert!(out.contains("pub const Default_Item_Flag: bool = true;"));

        field.default_value = Some("yes".to_string());
        assert!(holder(field).is_err());
    }

    #[test]
    fn test_integer_holders() {
        let mut field = scalar("n", 1, Kind::Sint32, Syntax::Proto2);
        field.default_value = Some("-7".to_string());
        assert!(holder(field).unwrap().contains("pub const Default_Item_N: i32 = -7i32;"));

        let mut field = scalar("big", 2, Kind::Fixed64, Syntax::Proto2);
        field.default_value = Some("42".to_string());
        assert!(holder(field).unwrap().contains("pub const Default_Item_Big: u64 = 42u64;"));
    }

    #[test]
    fn test_bytes_holder_keeps_raw_bytes() {
        let mut field = scalar("data", 1, Kind::Bytes, Syntax::Proto2);
        field.default_value = Some("\\377\\001".to_string());
        let out = holder(field).unwrap();
        assert!(out.contains("pub const Default_Item_Data: &[u8] = b\""));
        assert!(out.contains("\\xFF"));
    }

    #[test]
    fn test_non_utf8_bytes_default_has_no_tag_form() {
        let mut field = scalar("data", 1, Kind::Bytes, Syntax::Proto2);
        field.default_value = Some("\\377".to_string());
        assert!(matches!(
            encoded_default(&field),
            Err(GeneratorError::CodeGenError(_))
        ));
        field.default_value = Some("a\\tb".to_string());
        assert_eq!(encoded_default(&field).unwrap(), Some("a\tb".to_string()));
    }

    #[test]
    fn test_float_tag_defaults_use_shortest_form() {
        assert_eq!(format_float(2.5, false), "2.5");
        assert_eq!(format_float(3.0, false), "3");
        assert_eq!(format_float(123456.0, false), "123456");
        assert_eq!(format_float(1234567.0, false), "1.234567e+06");
        assert_eq!(format_float(1e21, false), "1e+21");
        assert_eq!(format_float(0.0001, false), "0.0001");
        assert_eq!(format_float(0.00001, false), "1e-05");
        assert_eq!(format_float(-0.25, true), "-0.25");
        assert_eq!(format_float(0.1, true), "0.1");

        let mut field = scalar("ratio", 1, Kind::Double, Syntax::Proto2);
        field.default_value = Some("2.50".to_string());
        assert_eq!(encoded_default(&field).unwrap(), Some("2.5".to_string()));
        field.default_value = Some("1e+06".to_string());
        assert_eq!(encoded_default(&field).unwrap(), Some("1e+06".to_string()));
    }
}
