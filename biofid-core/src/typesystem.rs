//! # Typesystem UIMA
//!
//! Lê os `typeDescription`s de um arquivo de typesystem UIMA: o nome de cada tipo e
//! seu supertipo. O scanner usa o typesystem para avisar sobre tipos não declarados e o
//! leitor ([`crate::reader`]) para selecionar taxa e locais por hierarquia de tipos.
//!
//! Sem arquivo explícito, o typesystem embutido (`resources/default_typesystem.xml`) é usado.

use std::collections::BTreeMap;
use std::path::Path;

use quick_xml::events::Event;
use quick_xml::reader::Reader;

use crate::error::{ConversionError, Result};

const DEFAULT_TYPESYSTEM: &str = include_str!("../resources/default_typesystem.xml");

#[derive(Debug, Clone, Default)]
pub struct TypeSystem {
    /// nome do tipo → supertipo
    types: BTreeMap<String, Option<String>>,
}

impl TypeSystem {
    /// Typesystem embutido no crate.
    pub fn builtin() -> Result<Self> {
        Self::parse(DEFAULT_TYPESYSTEM)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        if !path.is_file() {
            return Err(ConversionError::NotFound {
                path: path.to_path_buf(),
            });
        }
        Self::parse(&std::fs::read_to_string(path)?)
    }

    pub fn parse(xml: &str) -> Result<Self> {
        let mut reader = Reader::from_str(xml);
        reader.trim_text(true);

        let mut path: Vec<String> = Vec::new();
        let mut types = BTreeMap::new();
        let mut current: Option<String> = None;

        loop {
            let event = reader
                .read_event()
                .map_err(|e| ConversionError::TypeSystem(e.to_string()))?;
            match event {
                Event::Start(e) => {
                    path.push(String::from_utf8_lossy(e.local_name().as_ref()).into_owned());
                }
                Event::End(_) => {
                    if path.pop().as_deref() == Some("typeDescription") {
                        current = None;
                    }
                }
                Event::Text(t) => {
                    let text = t
                        .unescape()
                        .map_err(|e| ConversionError::TypeSystem(e.to_string()))?
                        .trim()
                        .to_string();
                    match parent_pair(&path) {
                        Some(("typeDescription", "name")) => {
                            types.insert(text.clone(), None);
                            current = Some(text);
                        }
                        Some(("typeDescription", "supertypeName")) => {
                            if let Some(name) = &current {
                                types.insert(name.clone(), Some(text));
                            }
                        }
                        _ => {}
                    }
                }
                Event::Eof => break,
                _ => {}
            }
        }

        if types.is_empty() {
            return Err(ConversionError::TypeSystem(
                "nenhum typeDescription encontrado".to_string(),
            ));
        }
        Ok(Self { types })
    }

    pub fn declares(&self, type_name: &str) -> bool {
        self.types.contains_key(type_name)
    }

    pub fn supertype(&self, type_name: &str) -> Option<&str> {
        self.types.get(type_name)?.as_deref()
    }

    /// `true` se `type_name` é `ancestor` ou herda dele.
    pub fn is_a(&self, type_name: &str, ancestor: &str) -> bool {
        let mut current = Some(type_name);
        // O limite evita laços em typesystems mal formados
        for _ in 0..=self.types.len() {
            match current {
                Some(name) if name == ancestor => return self.declares(ancestor),
                Some(name) => current = self.supertype(name),
                None => return false,
            }
        }
        false
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}

fn parent_pair(path: &[String]) -> Option<(&str, &str)> {
    match path {
        [.., parent, child] => Some((parent.as_str(), child.as_str())),
        _ => None,
    }
}
