use std::str::FromStr;

use bigdecimal::{BigDecimal, Zero};
use chrono::NaiveDateTime;

use crate::error::{MappingError, Parte};
use crate::models::{
    ImpostoItem, NotaMapeada, NotaStatus, NovaEmpresa, NovaNotaFiscal, NovoItem, NovoPagamento,
    NovoTransporte, TipoImposto, TipoPessoa,
};
use crate::nfe::parser::{Elemento, NfeDocument};

/// Prefixo textual do atributo Id do nó assinado (`NFe` + chave de 44 dígitos)
const PREFIXO_CHAVE: &str = "NFe";
const TAMANHO_CHAVE: usize = 44;

/// Mapeia o documento parseado para o grafo completo de entidades.
///
/// Determinístico: o mesmo XML produz sempre o mesmo grafo. Valores
/// monetários preservam a string decimal exata do documento; campo numérico
/// ausente vira `0` (SUM a jusante trata imposto ausente como zero).
pub fn map_nota(doc: &NfeDocument) -> Result<NotaMapeada, MappingError> {
    let inf = &doc.inf_nfe;

    let chave_acesso = extrair_chave(inf)?;

    // blocos garantidos pelo parser; sem bloco não há documento da parte
    let emitente = mapear_empresa(
        inf.filho("emit")
            .ok_or(MappingError::ParteSemDocumento(Parte::Emitente))?,
        "enderEmit",
        Parte::Emitente,
    )?;
    let destinatario = mapear_empresa(
        inf.filho("dest")
            .ok_or(MappingError::ParteSemDocumento(Parte::Destinatario))?,
        "enderDest",
        Parte::Destinatario,
    )?;

    let vazio = Elemento::default();
    let ide = inf.filho("ide").unwrap_or(&vazio);
    let total = inf.buscar("total/ICMSTot");

    let numero_nf = match ide.texto("nNF") {
        Some(v) => v.parse::<i64>().map_err(|_| MappingError::ValorInvalido {
            campo: "nNF",
            valor: v.to_string(),
        })?,
        None => 0,
    };

    let (status, protocolo) = derivar_status(doc.inf_prot.as_ref());

    let nota = NovaNotaFiscal {
        chave_acesso,
        numero_nf,
        serie: opt(ide, "serie"),
        modelo: opt(ide, "mod"),
        natureza_operacao: opt(ide, "natOp"),
        tipo_operacao: opt(ide, "tpNF"),
        data_hora_emissao: ide.texto("dhEmi").and_then(normalizar_datahora),
        emitente_id: None,
        destinatario_id: None,
        valor_total_produtos: decimal_opt(total, "vProd", "vProd")?,
        valor_frete: decimal_opt(total, "vFrete", "vFrete")?,
        valor_seguro: decimal_opt(total, "vSeg", "vSeg")?,
        valor_desconto: decimal_opt(total, "vDesc", "vDesc")?,
        valor_total_nota: decimal_opt(total, "vNF", "vNF")?,
        base_calculo_icms: decimal_opt(total, "vBC", "vBC")?,
        valor_icms: decimal_opt(total, "vICMS", "vICMS")?,
        valor_ipi: decimal_opt(total, "vIPI", "vIPI")?,
        valor_pis: decimal_opt(total, "vPIS", "vPIS")?,
        valor_cofins: decimal_opt(total, "vCOFINS", "vCOFINS")?,
        status,
        numero_protocolo: protocolo.and_then(|p| opt(p, "nProt")),
        codigo_status: protocolo.and_then(|p| opt(p, "cStat")),
        motivo_status: protocolo.and_then(|p| opt(p, "xMotivo")),
        data_hora_recebimento: protocolo
            .and_then(|p| p.texto("dhRecbto"))
            .and_then(normalizar_datahora),
        informacoes_complementares: inf.texto("infAdic/infCpl").map(str::to_string),
        informacoes_fisco: inf.texto("infAdic/infAdFisco").map(str::to_string),
        xml_completo: doc.xml_completo.clone(),
    };

    let mut itens = Vec::new();
    for det in inf.filhos_por_nome("det") {
        itens.push(mapear_item(det)?);
    }

    let mut pagamentos = Vec::new();
    if let Some(pag) = inf.filho("pag") {
        for det_pag in pag.filhos_por_nome("detPag") {
            pagamentos.push(NovoPagamento {
                indicador_pagamento: opt(det_pag, "indPag"),
                forma_pagamento: opt(det_pag, "tPag"),
                valor_pagamento: decimal(det_pag, "vPag", "vPag")?,
            });
        }
    }

    let transporte = inf.filho("transp").map(|transp| NovoTransporte {
        modalidade_frete: opt(transp, "modFrete"),
        transportadora_nome: transp.texto("transporta/xNome").map(str::to_string),
        transportadora_cnpj: transp.texto("transporta/CNPJ").map(str::to_string),
        veiculo_placa: transp.texto("veicTransp/placa").map(str::to_string),
        veiculo_uf: transp.texto("veicTransp/UF").map(str::to_string),
    });

    Ok(NotaMapeada {
        emitente,
        destinatario,
        nota,
        itens,
        pagamentos,
        transporte,
    })
}

/// Chave de acesso = atributo Id de infNFe menos o prefixo `NFe`
fn extrair_chave(inf: &Elemento) -> Result<String, MappingError> {
    let id = inf.atributo("Id").unwrap_or("");
    let chave = id.strip_prefix(PREFIXO_CHAVE).unwrap_or(id);
    if chave.len() != TAMANHO_CHAVE {
        return Err(MappingError::ChaveAcessoInvalida(chave.to_string()));
    }
    Ok(chave.to_string())
}

/// Exatamente um entre CNPJ e CPF deve existir; CNPJ tem precedência
fn mapear_empresa(
    el: &Elemento,
    ender_nome: &str,
    parte: Parte,
) -> Result<NovaEmpresa, MappingError> {
    let cnpj = el.texto("CNPJ");
    let cpf = el.texto("CPF");

    let (tipo_pessoa, documento) = match (cnpj, cpf) {
        (Some(cnpj), _) => (TipoPessoa::Juridica, cnpj),
        (None, Some(cpf)) => (TipoPessoa::Fisica, cpf),
        (None, None) => return Err(MappingError::ParteSemDocumento(parte)),
    };

    let ender = el.filho(ender_nome);

    Ok(NovaEmpresa {
        tipo_pessoa,
        cpf_cnpj: documento.to_string(),
        razao_social: opt(el, "xNome"),
        nome_fantasia: opt(el, "xFant"),
        inscricao_estadual: opt(el, "IE"),
        regime_tributario: opt(el, "CRT"),
        logradouro: ender.and_then(|e| opt(e, "xLgr")),
        numero: ender.and_then(|e| opt(e, "nro")),
        complemento: ender.and_then(|e| opt(e, "xCpl")),
        bairro: ender.and_then(|e| opt(e, "xBairro")),
        codigo_municipio: ender.and_then(|e| opt(e, "cMun")),
        nome_municipio: ender.and_then(|e| opt(e, "xMun")),
        uf: ender.and_then(|e| opt(e, "UF")),
        cep: ender.and_then(|e| opt(e, "CEP")),
        telefone: ender.and_then(|e| opt(e, "fone")),
        email: opt(el, "email"),
        indicador_ie_destinatario: opt(el, "indIEDest"),
    })
}

fn mapear_item(det: &Elemento) -> Result<NovoItem, MappingError> {
    let numero_item = match det.atributo("nItem") {
        Some(v) => v.parse::<i32>().map_err(|_| MappingError::ValorInvalido {
            campo: "nItem",
            valor: v.to_string(),
        })?,
        None => 0,
    };

    let prod = det.filho("prod");
    let imposto = det.filho("imposto");

    let mut impostos = Vec::new();
    if let Some(imposto) = imposto {
        for (tipo, aliquota_campo, valor_campo) in [
            (TipoImposto::Icms, "pICMS", "vICMS"),
            (TipoImposto::Ipi, "pIPI", "vIPI"),
            (TipoImposto::Pis, "pPIS", "vPIS"),
            (TipoImposto::Cofins, "pCOFINS", "vCOFINS"),
        ] {
            if let Some(imp) = mapear_imposto(imposto, tipo, aliquota_campo, valor_campo)? {
                impostos.push(imp);
            }
        }
    }

    Ok(NovoItem {
        numero_item,
        codigo_produto: prod.and_then(|p| opt(p, "cProd")),
        codigo_ean: prod.and_then(|p| opt(p, "cEAN")),
        descricao: prod.and_then(|p| opt(p, "xProd")),
        ncm: prod.and_then(|p| opt(p, "NCM")),
        cfop: prod.and_then(|p| opt(p, "CFOP")),
        unidade_comercial: prod.and_then(|p| opt(p, "uCom")),
        quantidade_comercial: decimal_opt(prod, "qCom", "qCom")?,
        valor_unitario_comercial: decimal_opt(prod, "vUnCom", "vUnCom")?,
        valor_total_bruto: decimal_opt(prod, "vProd", "vProd")?,
        unidade_tributavel: prod.and_then(|p| opt(p, "uTrib")),
        quantidade_tributavel: decimal_opt(prod, "qTrib", "qTrib")?,
        valor_unitario_tributavel: decimal_opt(prod, "vUnTrib", "vUnTrib")?,
        impostos,
    })
}

/// Seleciona o sub-bloco variante do imposto (ex.: ICMS00, ICMSSN102,
/// IPITrib, PISAliq). O leiaute permite variantes alternativas; vale o
/// primeiro bloco com filhos, determinístico (simplificação documentada,
/// não perda silenciosa). Folhas como `cEnq` dentro de IPI são puladas.
fn mapear_imposto(
    imposto: &Elemento,
    tipo: TipoImposto,
    aliquota_campo: &'static str,
    valor_campo: &'static str,
) -> Result<Option<ImpostoItem>, MappingError> {
    let nome_bloco = match tipo {
        TipoImposto::Icms => "ICMS",
        TipoImposto::Ipi => "IPI",
        TipoImposto::Pis => "PIS",
        TipoImposto::Cofins => "COFINS",
    };

    let Some(bloco) = imposto.filho(nome_bloco) else {
        return Ok(None);
    };
    let Some(variante) = bloco.filhos.iter().find(|f| !f.filhos.is_empty()) else {
        return Ok(None);
    };

    Ok(Some(ImpostoItem {
        tipo,
        origem: match tipo {
            TipoImposto::Icms => opt(variante, "orig"),
            _ => None,
        },
        cst: opt(variante, "CST"),
        csosn: match tipo {
            TipoImposto::Icms => opt(variante, "CSOSN"),
            _ => None,
        },
        valor_bc: decimal(variante, "vBC", "vBC")?,
        aliquota: decimal(variante, aliquota_campo, aliquota_campo)?,
        valor: decimal(variante, valor_campo, valor_campo)?,
    }))
}

fn derivar_status(inf_prot: Option<&Elemento>) -> (NotaStatus, Option<&Elemento>) {
    let Some(prot) = inf_prot else {
        return (NotaStatus::Emitida, None);
    };
    let status = match prot.texto("cStat") {
        Some("100") => NotaStatus::Autorizada,
        Some("101") | Some("135") => NotaStatus::Cancelada,
        Some("110") | Some("301") | Some("302") => NotaStatus::Denegada,
        Some(_) => NotaStatus::Rejeitada,
        // protocolo presente sem cStat: trata como autorizada (comportamento
        // do importador original, que só checava a presença do protocolo)
        None => NotaStatus::Autorizada,
    };
    (status, Some(prot))
}

/// Remove o offset de fuso (`-03:00`, `+hh:mm` ou `Z`) e devolve o horário
/// local como NaiveDateTime
fn normalizar_datahora(valor: &str) -> Option<NaiveDateTime> {
    let base = valor.get(..19)?;
    NaiveDateTime::parse_from_str(base, "%Y-%m-%dT%H:%M:%S").ok()
}

fn opt(el: &Elemento, caminho: &str) -> Option<String> {
    el.texto(caminho).map(str::to_string)
}

/// Decimal do texto exato do XML; ausente vira zero
fn decimal(el: &Elemento, caminho: &str, campo: &'static str) -> Result<BigDecimal, MappingError> {
    match el.texto(caminho) {
        None => Ok(BigDecimal::zero()),
        Some(v) => BigDecimal::from_str(v).map_err(|_| MappingError::ValorInvalido {
            campo,
            valor: v.to_string(),
        }),
    }
}

fn decimal_opt(
    el: Option<&Elemento>,
    caminho: &str,
    campo: &'static str,
) -> Result<BigDecimal, MappingError> {
    match el {
        Some(el) => decimal(el, caminho, campo),
        None => Ok(BigDecimal::zero()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nfe::fixtures::{nfe_completa, nfe_sem_documento_destinatario, CHAVE_TESTE};

    fn mapear(xml: &str) -> NotaMapeada {
        let doc = NfeDocument::parse(xml.as_bytes()).unwrap();
        map_nota(&doc).unwrap()
    }

    #[test]
    fn nota_completa_decompoe_grafo_inteiro() {
        let mapeada = mapear(&nfe_completa(CHAVE_TESTE));

        assert_eq!(mapeada.nota.chave_acesso, CHAVE_TESTE);
        assert_eq!(mapeada.nota.numero_nf, 61650);
        assert_eq!(mapeada.nota.status, NotaStatus::Autorizada);
        assert_eq!(mapeada.emitente.tipo_pessoa, TipoPessoa::Juridica);
        assert_eq!(mapeada.destinatario.tipo_pessoa, TipoPessoa::Fisica);
        assert_eq!(mapeada.itens.len(), 2);
        assert_eq!(mapeada.pagamentos.len(), 1);
        assert!(mapeada.transporte.is_some());

        let item1 = &mapeada.itens[0];
        assert_eq!(item1.numero_item, 1);
        assert_eq!(item1.cfop.as_deref(), Some("5102"));
        // ICMS + PIS + COFINS presentes; IPI ausente no primeiro item
        assert_eq!(item1.impostos.len(), 3);
        assert!(item1.impostos.iter().all(|i| i.tipo != TipoImposto::Ipi));
    }

    #[test]
    fn decimal_preserva_precisao_exata() {
        let xml = nfe_completa(CHAVE_TESTE).replace("1234.56", "1234.5678901234");
        let mapeada = mapear(&xml);
        assert_eq!(
            mapeada.nota.valor_total_nota,
            BigDecimal::from_str("1234.5678901234").unwrap()
        );
        assert_eq!(mapeada.nota.valor_total_nota.to_string(), "1234.5678901234");
    }

    #[test]
    fn campo_monetario_ausente_vira_zero() {
        let mapeada = mapear(&nfe_completa(CHAVE_TESTE));
        // vSeg não aparece na fixture
        assert_eq!(mapeada.nota.valor_seguro, BigDecimal::zero());
    }

    #[test]
    fn parte_sem_cnpj_nem_cpf_falha_identificando_a_parte() {
        let doc = NfeDocument::parse(nfe_sem_documento_destinatario().as_bytes()).unwrap();
        let err = map_nota(&doc).unwrap_err();
        assert!(matches!(
            err,
            MappingError::ParteSemDocumento(Parte::Destinatario)
        ));
    }

    #[test]
    fn chave_com_tamanho_errado_falha() {
        let xml = nfe_completa("123");
        let doc = NfeDocument::parse(xml.as_bytes()).unwrap();
        let err = map_nota(&doc).unwrap_err();
        assert!(matches!(err, MappingError::ChaveAcessoInvalida(_)));
    }

    #[test]
    fn datahora_tem_fuso_removido() {
        let mapeada = mapear(&nfe_completa(CHAVE_TESTE));
        let emissao = mapeada.nota.data_hora_emissao.unwrap();
        assert_eq!(emissao.to_string(), "2025-08-12 14:30:00");
    }

    #[test]
    fn primeira_variante_de_imposto_vence() {
        // duas variantes de ICMS no mesmo bloco: vale a primeira
        let xml = nfe_completa(CHAVE_TESTE).replace(
            "<ICMS><ICMS00><orig>0</orig><CST>00</CST><vBC>45.00</vBC><pICMS>18.00</pICMS><vICMS>8.10</vICMS></ICMS00></ICMS>",
            "<ICMS><ICMS00><orig>0</orig><CST>00</CST><vBC>45.00</vBC><pICMS>18.00</pICMS><vICMS>8.10</vICMS></ICMS00><ICMS20><CST>20</CST><vBC>99.00</vBC></ICMS20></ICMS>",
        );
        let mapeada = mapear(&xml);
        let icms = mapeada.itens[0]
            .impostos
            .iter()
            .find(|i| i.tipo == TipoImposto::Icms)
            .unwrap();
        assert_eq!(icms.cst.as_deref(), Some("00"));
        assert_eq!(icms.valor_bc, BigDecimal::from_str("45.00").unwrap());
    }

    #[test]
    fn sem_protocolo_status_emitida() {
        let xml = nfe_completa(CHAVE_TESTE);
        let inicio = xml.find("<protNFe").unwrap();
        let fim = xml.find("</protNFe>").unwrap() + "</protNFe>".len();
        let sem_prot = format!("{}{}", &xml[..inicio], &xml[fim..]);
        let mapeada = mapear(&sem_prot);
        assert_eq!(mapeada.nota.status, NotaStatus::Emitida);
        assert!(mapeada.nota.numero_protocolo.is_none());
    }

    #[test]
    fn protocolo_cancelamento_vira_cancelada() {
        let xml = nfe_completa(CHAVE_TESTE).replace("<cStat>100</cStat>", "<cStat>101</cStat>");
        assert_eq!(mapear(&xml).nota.status, NotaStatus::Cancelada);
    }
}
