//! XMLs de NF-e sintéticos usados nos testes de unidade e de integração.

/// Chave de acesso válida (44 dígitos)
pub const CHAVE_TESTE: &str = "42250802314041001583650100000616501312602792";

/// Segunda chave válida para cenários com mais de uma nota
pub const CHAVE_TESTE_2: &str = "35250955555555000191550010000000011000000019";

/// Nota completa: 2 itens, impostos por item, 1 pagamento, transporte e
/// protocolo de autorização.
pub fn nfe_completa(chave: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<nfeProc xmlns="http://www.portalfiscal.inf.br/nfe" versao="4.00">
  <NFe>
    <infNFe Id="NFe{chave}" versao="4.00">
      <ide>
        <cUF>42</cUF>
        <natOp>VENDA DE MERCADORIA</natOp>
        <mod>55</mod>
        <serie>1</serie>
        <nNF>61650</nNF>
        <dhEmi>2025-08-12T14:30:00-03:00</dhEmi>
        <tpNF>1</tpNF>
      </ide>
      <emit>
        <CNPJ>02314041001583</CNPJ>
        <xNome>Comercio de Pecas Alfa LTDA</xNome>
        <xFant>Alfa Pecas</xFant>
        <IE>254879632</IE>
        <CRT>3</CRT>
        <enderEmit>
          <xLgr>Rua das Industrias</xLgr>
          <nro>1500</nro>
          <xBairro>Distrito Industrial</xBairro>
          <cMun>4205407</cMun>
          <xMun>Joinville</xMun>
          <UF>SC</UF>
          <CEP>89201000</CEP>
        </enderEmit>
      </emit>
      <dest>
        <CPF>12345678909</CPF>
        <xNome>Jose da Silva</xNome>
        <enderDest>
          <xLgr>Av Beira Mar</xLgr>
          <nro>42</nro>
          <xMun>Florianopolis</xMun>
          <UF>SC</UF>
        </enderDest>
      </dest>
      <det nItem="1">
        <prod>
          <cProd>PC-001</cProd>
          <cEAN>7891234567895</cEAN>
          <xProd>Filtro de oleo</xProd>
          <NCM>84212300</NCM>
          <CFOP>5102</CFOP>
          <uCom>UN</uCom>
          <qCom>3.0000</qCom>
          <vUnCom>15.0000</vUnCom>
          <vProd>45.00</vProd>
        </prod>
        <imposto>
          <ICMS><ICMS00><orig>0</orig><CST>00</CST><vBC>45.00</vBC><pICMS>18.00</pICMS><vICMS>8.10</vICMS></ICMS00></ICMS>
          <PIS><PISAliq><CST>01</CST><vBC>45.00</vBC><pPIS>1.65</pPIS><vPIS>0.74</vPIS></PISAliq></PIS>
          <COFINS><COFINSAliq><CST>01</CST><vBC>45.00</vBC><pCOFINS>7.60</pCOFINS><vCOFINS>3.42</vCOFINS></COFINSAliq></COFINS>
        </imposto>
      </det>
      <det nItem="2">
        <prod>
          <cProd>PC-002</cProd>
          <xProd>Correia dentada</xProd>
          <NCM>40103500</NCM>
          <CFOP>5102</CFOP>
          <uCom>UN</uCom>
          <qCom>1.0000</qCom>
          <vUnCom>89.9000</vUnCom>
          <vProd>89.90</vProd>
        </prod>
        <imposto>
          <ICMS><ICMSSN102><orig>0</orig><CSOSN>102</CSOSN></ICMSSN102></ICMS>
          <IPI><cEnq>999</cEnq><IPITrib><CST>50</CST><vBC>89.90</vBC><pIPI>5.00</pIPI><vIPI>4.50</vIPI></IPITrib></IPI>
        </imposto>
      </det>
      <total>
        <ICMSTot>
          <vBC>45.00</vBC>
          <vICMS>8.10</vICMS>
          <vIPI>4.50</vIPI>
          <vPIS>0.74</vPIS>
          <vCOFINS>3.42</vCOFINS>
          <vProd>134.90</vProd>
          <vFrete>12.00</vFrete>
          <vDesc>0.00</vDesc>
          <vNF>1234.56</vNF>
        </ICMSTot>
      </total>
      <transp>
        <modFrete>1</modFrete>
        <transporta>
          <CNPJ>11222333000181</CNPJ>
          <xNome>Transportes Rapidao</xNome>
        </transporta>
        <veicTransp>
          <placa>ABC1D23</placa>
          <UF>SC</UF>
        </veicTransp>
      </transp>
      <pag>
        <detPag>
          <indPag>0</indPag>
          <tPag>01</tPag>
          <vPag>1234.56</vPag>
        </detPag>
      </pag>
      <infAdic>
        <infCpl>Pedido 4521</infCpl>
      </infAdic>
    </infNFe>
  </NFe>
  <protNFe versao="4.00">
    <infProt>
      <tpAmb>1</tpAmb>
      <cStat>100</cStat>
      <nProt>342250000000001</nProt>
      <xMotivo>Autorizado o uso da NF-e</xMotivo>
      <dhRecbto>2025-08-12T14:31:05-03:00</dhRecbto>
    </infProt>
  </protNFe>
</nfeProc>"#
    )
}

/// Nota estruturalmente válida porém com destinatário sem CNPJ nem CPF
pub fn nfe_sem_documento_destinatario() -> String {
    nfe_completa(CHAVE_TESTE).replace("<CPF>12345678909</CPF>", "")
}
