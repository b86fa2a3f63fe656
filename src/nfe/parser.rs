use quick_xml::events::Event;
use quick_xml::Reader;

use crate::error::ParseError;

/// Elemento XML já com o prefixo de namespace removido.
///
/// A NF-e usa um único namespace fixo (portalfiscal.inf.br/nfe), então a
/// resolução se reduz a comparar nomes locais.
#[derive(Debug, Clone, Default)]
pub struct Elemento {
    pub nome: String,
    pub atributos: Vec<(String, String)>,
    pub texto: String,
    pub filhos: Vec<Elemento>,
}

impl Elemento {
    /// Valor de atributo por nome local
    pub fn atributo(&self, nome: &str) -> Option<&str> {
        self.atributos
            .iter()
            .find(|(k, _)| k == nome)
            .map(|(_, v)| v.as_str())
    }

    /// Primeiro filho direto com o nome dado
    pub fn filho(&self, nome: &str) -> Option<&Elemento> {
        self.filhos.iter().find(|f| f.nome == nome)
    }

    /// Todos os filhos diretos com o nome dado (ex.: `det`, `detPag`)
    pub fn filhos_por_nome<'a>(&'a self, nome: &'a str) -> impl Iterator<Item = &'a Elemento> {
        self.filhos.iter().filter(move |f| f.nome == nome)
    }

    /// Desce pelo caminho `a/b/c` pegando sempre o primeiro filho que casa
    pub fn buscar(&self, caminho: &str) -> Option<&Elemento> {
        let mut atual = self;
        for passo in caminho.split('/') {
            atual = atual.filho(passo)?;
        }
        Some(atual)
    }

    /// Texto do nó no caminho dado; `None` quando o nó não existe ou é vazio.
    /// Blocos opcionais do leiaute nunca geram erro aqui.
    pub fn texto(&self, caminho: &str) -> Option<&str> {
        let el = self.buscar(caminho)?;
        if el.texto.is_empty() {
            None
        } else {
            Some(el.texto.as_str())
        }
    }

    /// Texto do nó ou um default fornecido pelo chamador
    pub fn texto_ou<'a>(&'a self, caminho: &str, default: &'a str) -> &'a str {
        self.texto(caminho).unwrap_or(default)
    }
}

/// Documento NF-e parseado: subárvore `infNFe`, protocolo opcional e o XML
/// bruto para auditoria.
#[derive(Debug, Clone)]
pub struct NfeDocument {
    pub inf_nfe: Elemento,
    pub inf_prot: Option<Elemento>,
    pub xml_completo: String,
}

impl NfeDocument {
    /// Faz o parse dos bytes e valida a estrutura mínima do documento.
    ///
    /// Falha cedo e com precisão: o chamador sabe qual bloco obrigatório
    /// (`ide`, `emit`, `dest`, `total`) estava ausente.
    pub fn parse(bytes: &[u8]) -> Result<NfeDocument, ParseError> {
        let xml = std::str::from_utf8(bytes)
            .map_err(|e| ParseError::Xml(format!("codificação inválida: {e}")))?;

        let raiz = construir_arvore(xml)?;

        // a nota pode vir embrulhada em nfeProc ou direta como NFe
        let nfe = if raiz.nome == "NFe" {
            &raiz
        } else {
            descer_ate(&raiz, "NFe").ok_or(ParseError::NoRoot)?
        };
        let inf_nfe = nfe.filho("infNFe").ok_or(ParseError::NoRoot)?.clone();

        for bloco in ["ide", "emit", "dest", "total"] {
            if inf_nfe.filho(bloco).is_none() {
                return Err(ParseError::MissingBlock(bloco));
            }
        }

        let inf_prot = descer_ate(&raiz, "protNFe")
            .and_then(|p| p.filho("infProt"))
            .cloned();

        Ok(NfeDocument {
            inf_nfe,
            inf_prot,
            xml_completo: xml.to_string(),
        })
    }
}

/// Busca em profundidade pelo primeiro elemento com o nome dado
fn descer_ate<'a>(el: &'a Elemento, nome: &str) -> Option<&'a Elemento> {
    if el.nome == nome {
        return Some(el);
    }
    el.filhos.iter().find_map(|f| descer_ate(f, nome))
}

/// Remove prefixo de namespace: `nfe:infNFe` -> `infNFe`
fn nome_local(qname: &[u8]) -> String {
    let nome = match qname.iter().rposition(|&b| b == b':') {
        Some(i) => &qname[i + 1..],
        None => qname,
    };
    String::from_utf8_lossy(nome).into_owned()
}

fn ler_atributos(e: &quick_xml::events::BytesStart<'_>) -> Result<Vec<(String, String)>, ParseError> {
    let mut atributos = Vec::new();
    for attr in e.attributes() {
        let attr = attr.map_err(|e| ParseError::Xml(e.to_string()))?;
        // atributos de declaração de namespace não interessam à árvore
        if attr.key.as_ref() == b"xmlns" || attr.key.as_ref().starts_with(b"xmlns:") {
            continue;
        }
        let valor = attr
            .unescape_value()
            .map_err(|e| ParseError::Xml(e.to_string()))?;
        atributos.push((nome_local(attr.key.as_ref()), valor.into_owned()));
    }
    Ok(atributos)
}

/// Constrói a árvore de elementos a partir do fluxo de eventos do quick-xml
fn construir_arvore(xml: &str) -> Result<Elemento, ParseError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut pilha: Vec<Elemento> = Vec::new();
    let mut raiz: Option<Elemento> = None;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                pilha.push(Elemento {
                    nome: nome_local(e.name().as_ref()),
                    atributos: ler_atributos(&e)?,
                    ..Default::default()
                });
            }
            Ok(Event::Empty(e)) => {
                let el = Elemento {
                    nome: nome_local(e.name().as_ref()),
                    atributos: ler_atributos(&e)?,
                    ..Default::default()
                };
                match pilha.last_mut() {
                    Some(pai) => pai.filhos.push(el),
                    None if raiz.is_none() => raiz = Some(el),
                    None => {}
                }
            }
            Ok(Event::Text(e)) => {
                if let Some(topo) = pilha.last_mut() {
                    let texto = e.unescape().map_err(|e| ParseError::Xml(e.to_string()))?;
                    topo.texto.push_str(&texto);
                }
            }
            Ok(Event::CData(e)) => {
                if let Some(topo) = pilha.last_mut() {
                    topo.texto.push_str(&String::from_utf8_lossy(e.as_ref()));
                }
            }
            Ok(Event::End(_)) => {
                let el = pilha
                    .pop()
                    .ok_or_else(|| ParseError::Xml("fechamento sem abertura".to_string()))?;
                match pilha.last_mut() {
                    Some(pai) => pai.filhos.push(el),
                    None if raiz.is_none() => raiz = Some(el),
                    None => {}
                }
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => return Err(ParseError::Xml(e.to_string())),
        }
    }

    if !pilha.is_empty() {
        return Err(ParseError::Xml("documento truncado".to_string()));
    }
    raiz.ok_or(ParseError::NoRoot)
}
