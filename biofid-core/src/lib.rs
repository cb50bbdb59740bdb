//! # biofid-core — Conversão de Anotações UIMA em Texto Anotado
//!
//! Este crate transforma documentos UIMA (XMI) produzidos pelos pipelines de NLP do BIOfid
//! em uma única string com marcação inline: cada entidade nomeada vira uma tag em volta do
//! trecho que ela cobre, e sentenças/páginas viram elementos estruturais.
//!
//! ## Arquitetura do Sistema
//!
//! O documento flui por um pipeline linear:
//!
//! 1.  **Scanner** ([`scanner`]): uma passada de streaming sobre o XMI captura o texto e
//!     as anotações; uma segunda passada coleta os comentários de anotação.
//! 2.  **Índice** ([`index`]): arena de anotações com visões por span e por posição.
//! 3.  **Normalização** ([`normalize`]): a "sopa" de atributos brutos vira um vocabulário
//!     semântico fixo (`wikidata`, `biofid-uri`, `probability-score`...).
//! 4.  **Resolução** ([`resolver`]): duplicatas, ruído e links da Wikipedia são resolvidos
//!     por posição; a ordem das tags sai de uma chave de prioridade.
//! 5.  **Renderização** ([`render`]): o texto é percorrido caractere a caractere.
//!
//! ## Exemplo de Uso
//!
//! ```rust,no_run
//! use biofid_core::convert_uima_to_annotated_text;
//!
//! match convert_uima_to_annotated_text("data/1901_flora.xmi.gz") {
//!     Some(markup) => println!("{}", markup),
//!     None => eprintln!("documento sem conteúdo anotado"),
//! }
//! ```
//!
//! ## Módulos Principais
//!
//! - [`convert`]: Orquestrador (arquivo único e lote em paralelo).
//! - [`reader`]: Fachada de leitura (taxa, locais, texto).
//! - [`config`] e [`typesystem`]: O que é relevante no XMI e quais tipos existem.
//! - [`extract`]: Extração de texto de PDFs (feature `pdf`).

pub mod annotation;
pub mod config;
pub mod convert;
pub mod error;
pub mod extract;
pub mod index;
pub mod normalize;
pub mod reader;
pub mod render;
pub mod resolver;
pub mod scanner;
pub mod typesystem;

pub use annotation::{Annotation, AnnotationKind, AttributeMap, TaxonClass};
pub use config::{ConversionConfig, ScannerConfig};
pub use convert::{convert_directory, convert_file, convert_uima_to_annotated_text, BatchReport};
pub use error::{ConversionError, Result};
pub use index::{AnnotationId, AnnotationIndex};
pub use reader::{NamedEntity, NlpReader, UimaReader};
pub use typesystem::TypeSystem;
